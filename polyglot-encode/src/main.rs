//! polyglot-encode - Encoding stage binary

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use polyglot_common::bus::{MemoryBus, MessageBus};
use polyglot_common::consumer::run_stage;
use polyglot_common::memory::MemoryGovernor;
use polyglot_encode::config::EncodeConfig;
use polyglot_encode::consumer::EncodingStage;
use polyglot_encode::encoder::DeflateEncoder;
use polyglot_encode::store::InMemoryEncodingStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting polyglot encode service v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config: EncodeConfig = polyglot_common::config::load_config("polyglot-encode")?;
    info!("compression level: {}", config.compression_level);

    let encoder = Arc::new(DeflateEncoder::new(config.compression_level));
    let store = Arc::new(InMemoryEncodingStore::new());

    // Private in-process bus: carries only this process's own traffic. A
    // brokered deployment replaces it with a MessageBus client for the
    // real transport; the polyglot-pipeline binary composes every stage
    // onto one shared bus for single-process deployments.
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
    let governor = MemoryGovernor::for_process()?;

    let stage = Arc::new(EncodingStage::new(encoder, store));
    let worker = tokio::spawn(run_stage(bus, governor, stage));

    info!("encode service ready");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    worker.abort();

    Ok(())
}
