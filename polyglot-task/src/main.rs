//! polyglot-task - Task service binary
//!
//! Owns the task database and the two finalizer consumers. Task creation,
//! cancel and restart are exposed programmatically through
//! [`polyglot_task::service::TaskService`]; the HTTP surface in front of it
//! is deployment-specific and lives outside this repository.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use polyglot_common::bus::{MemoryBus, MessageBus};
use polyglot_common::consumer::run_stage;
use polyglot_common::memory::MemoryGovernor;
use polyglot_task::config::TaskConfig;
use polyglot_task::consumers::{EncodingCompletedHandler, TaskFailedHandler};
use polyglot_task::store::{self, TaskStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting polyglot task service v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config: TaskConfig = polyglot_common::config::load_config("polyglot-task")?;
    info!(
        "audio source: {}, database: {}",
        config.audio_source_path, config.database_path
    );

    let pool = store::connect(&PathBuf::from(&config.database_path)).await?;
    let store = TaskStore::new(pool);

    // Private in-process bus: carries only this process's own traffic. A
    // brokered deployment replaces it with a MessageBus client for the
    // real transport; the polyglot-pipeline binary composes every stage
    // onto one shared bus for single-process deployments.
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
    let governor = MemoryGovernor::for_process()?;

    let encoding_done = tokio::spawn(run_stage(
        bus.clone(),
        governor.clone(),
        Arc::new(EncodingCompletedHandler::new(store.clone())),
    ));
    let task_failed = tokio::spawn(run_stage(
        bus.clone(),
        governor,
        Arc::new(TaskFailedHandler::new(store)),
    ));

    info!("task service ready");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    encoding_done.abort();
    task_failed.abort();

    Ok(())
}
