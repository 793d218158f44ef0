//! polyglot-pipeline - Single-process pipeline binary
//!
//! Runs every stage worker and both task finalizers on one shared
//! in-process bus, so a complete pipeline needs no external broker. The
//! per-service binaries are for brokered deployments, where each process
//! is given a `MessageBus` client for the real transport.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use polyglot_common::bus::{MemoryBus, MessageBus};
use polyglot_common::consumer::run_stage;
use polyglot_common::memory::MemoryGovernor;
use polyglot_common::task::split_languages;
use polyglot_encode::config::EncodeConfig;
use polyglot_encode::consumer::EncodingStage;
use polyglot_encode::encoder::DeflateEncoder;
use polyglot_encode::store::InMemoryEncodingStore;
use polyglot_speech::config::SpeechConfig;
use polyglot_speech::consumer::RecognitionStage;
use polyglot_speech::whisper::WhisperRecognizer;
use polyglot_task::config::TaskConfig;
use polyglot_task::consumers::{EncodingCompletedHandler, TaskFailedHandler};
use polyglot_task::service::{CreateTaskRequest, TaskService};
use polyglot_task::store::{self, TaskStore};
use polyglot_translate::config::TranslateConfig;
use polyglot_translate::consumer::TranslationStage;
use polyglot_translate::deepseek::DeepSeekTranslator;

/// Command-line arguments for polyglot-pipeline
#[derive(Parser, Debug)]
#[command(name = "polyglot-pipeline")]
#[command(about = "Run the whole audio translation pipeline in one process")]
#[command(version)]
struct Args {
    /// Audio directory (under the configured audio source root) to submit
    /// as a task once all stages are running
    #[arg(long)]
    submit: Option<String>,

    /// Source language code for the submitted task
    #[arg(long, default_value = "auto")]
    source_language: String,

    /// Comma-separated target language codes for the submitted task
    #[arg(long, default_value = "en")]
    target_languages: String,

    /// Task priority, 1-10, lower = higher priority
    #[arg(long, default_value = "5")]
    priority: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting polyglot pipeline v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let task_config: TaskConfig = polyglot_common::config::load_config("polyglot-task")?;
    let speech_config: SpeechConfig = polyglot_common::config::load_config("polyglot-speech")?;
    let translate_config: TranslateConfig =
        polyglot_common::config::load_config("polyglot-translate")?;
    let encode_config: EncodeConfig = polyglot_common::config::load_config("polyglot-encode")?;

    let pool = store::connect(&PathBuf::from(&task_config.database_path)).await?;
    let task_store = TaskStore::new(pool);

    // One bus shared by every stage in this process.
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
    let governor = MemoryGovernor::for_process()?;

    let recognizer = Arc::new(WhisperRecognizer::new(&speech_config));
    let translator = Arc::new(DeepSeekTranslator::new(&translate_config)?);
    let encoder = Arc::new(DeflateEncoder::new(encode_config.compression_level));
    let encoding_store = Arc::new(InMemoryEncodingStore::new());

    let workers = vec![
        tokio::spawn(run_stage(
            bus.clone(),
            governor.clone(),
            Arc::new(RecognitionStage::new(recognizer)),
        )),
        tokio::spawn(run_stage(
            bus.clone(),
            governor.clone(),
            Arc::new(TranslationStage::new(translator)),
        )),
        tokio::spawn(run_stage(
            bus.clone(),
            governor.clone(),
            Arc::new(EncodingStage::new(encoder, encoding_store)),
        )),
        tokio::spawn(run_stage(
            bus.clone(),
            governor.clone(),
            Arc::new(EncodingCompletedHandler::new(task_store.clone())),
        )),
        tokio::spawn(run_stage(
            bus.clone(),
            governor,
            Arc::new(TaskFailedHandler::new(task_store.clone())),
        )),
    ];
    // The in-process bus does not replay history: every consumer must be
    // subscribed before the first publish.
    tokio::time::sleep(Duration::from_millis(100)).await;
    info!("pipeline ready: all stage consumers running");

    let service = TaskService::new(
        task_store,
        bus,
        PathBuf::from(&task_config.audio_source_path),
    );

    if let Some(audio_directory) = args.submit {
        let created = service
            .create_task(&CreateTaskRequest {
                audio_directory,
                source_language: args.source_language,
                target_languages: split_languages(&args.target_languages),
                priority: args.priority,
            })
            .await?;
        info!(
            "submitted task: taskId={}, totalFiles={}",
            created.task_id, created.total_files
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    for worker in workers {
        worker.abort();
    }

    Ok(())
}
