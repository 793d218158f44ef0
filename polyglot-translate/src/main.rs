//! polyglot-translate - Translation stage binary

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use polyglot_common::bus::{MemoryBus, MessageBus};
use polyglot_common::consumer::run_stage;
use polyglot_common::memory::MemoryGovernor;
use polyglot_translate::config::TranslateConfig;
use polyglot_translate::consumer::TranslationStage;
use polyglot_translate::deepseek::DeepSeekTranslator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting polyglot translate service v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config: TranslateConfig = polyglot_common::config::load_config("polyglot-translate")?;
    info!("translation API: {}, model: {}", config.api_url, config.model);

    let translator = Arc::new(DeepSeekTranslator::new(&config)?);

    // Private in-process bus: carries only this process's own traffic. A
    // brokered deployment replaces it with a MessageBus client for the
    // real transport; the polyglot-pipeline binary composes every stage
    // onto one shared bus for single-process deployments.
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
    let governor = MemoryGovernor::for_process()?;

    let stage = Arc::new(TranslationStage::new(translator));
    let worker = tokio::spawn(run_stage(bus, governor, stage));

    info!("translate service ready");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    worker.abort();

    Ok(())
}
