//! polyglot-speech - Speech recognition stage binary

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use polyglot_common::bus::{MemoryBus, MessageBus};
use polyglot_common::consumer::run_stage;
use polyglot_common::memory::MemoryGovernor;
use polyglot_speech::config::SpeechConfig;
use polyglot_speech::consumer::RecognitionStage;
use polyglot_speech::whisper::WhisperRecognizer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting polyglot speech service v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config: SpeechConfig = polyglot_common::config::load_config("polyglot-speech")?;
    info!(
        "whisper script: {}, model: {}",
        config.whisper_script_path, config.whisper_model
    );

    let recognizer = Arc::new(WhisperRecognizer::new(&config));

    // Private in-process bus: carries only this process's own traffic. A
    // brokered deployment replaces it with a MessageBus client for the
    // real transport; the polyglot-pipeline binary composes every stage
    // onto one shared bus for single-process deployments.
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
    let governor = MemoryGovernor::for_process()?;

    let stage = Arc::new(RecognitionStage::new(recognizer));
    let worker = tokio::spawn(run_stage(bus, governor, stage));

    info!("speech service ready");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    worker.abort();

    Ok(())
}
