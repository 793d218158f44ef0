//! Encoding service configuration

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// Deflate compression level, 0 (none) through 9 (best).
    pub compression_level: u32,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: EncodeConfig = toml::from_str("").unwrap();
        assert_eq!(config.compression_level, 6);

        let config: EncodeConfig = toml::from_str("compression_level = 9").unwrap();
        assert_eq!(config.compression_level, 9);
    }
}
