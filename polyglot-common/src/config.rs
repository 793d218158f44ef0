//! Configuration loading
//!
//! Every service resolves its TOML config file the same way:
//! 1. `POLYGLOT_CONFIG` environment variable (highest priority)
//! 2. `./<service>.toml` in the working directory
//! 3. Compiled defaults (missing file is a warning, never fatal)
//!
//! Parse errors in a file that does exist are fatal: a present-but-broken
//! config is operator error, not a missing-config fallback.

use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable naming an explicit config file path.
pub const CONFIG_ENV_VAR: &str = "POLYGLOT_CONFIG";

/// Resolve the config file path for `service` ("polyglot-task" etc.).
pub fn config_path(service: &str) -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }
    PathBuf::from(format!("{service}.toml"))
}

/// Load the typed config for `service`, falling back to defaults when the
/// file is absent.
pub fn load_config<T: DeserializeOwned + Default>(service: &str) -> Result<T> {
    let path = config_path(service);
    if !path.exists() {
        warn!(
            "config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    info!("loaded config from {}", path.display());
    Ok(config)
}
