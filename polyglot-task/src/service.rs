//! Task orchestration
//!
//! Entry point of the pipeline. Creates the task record, publishes the
//! initiating `task.created` message, and implements cancel/restart by
//! mutating the record (and, for restart, replaying the initial message).
//!
//! Consistency between "row state" and "message emitted" is best-effort: a
//! crash between publish and update leaves them inconsistent and no
//! compensating mechanism exists. The rollback path below only covers a
//! publish call that returns an error.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use polyglot_common::bus::{publish_json, MessageBus};
use polyglot_common::language::Language;
use polyglot_common::messages::TaskCreatedMessage;
use polyglot_common::task::{join_languages, task_type, TaskStatus, TranslationTask};
use polyglot_common::{topics, Error, Result};

use crate::store::TaskStore;

/// Request to create an audio translation task.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    /// Directory name under the configured audio source root.
    pub audio_directory: String,
    pub source_language: String,
    pub target_languages: Vec<String>,
    /// 1-10, lower = higher priority.
    #[serde(default = "default_priority")]
    pub priority: i64,
}

fn default_priority() -> i64 {
    5
}

/// Creation result returned to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTask {
    pub task_id: String,
    pub audio_directory: String,
    pub total_files: i64,
    pub status: TaskStatus,
    pub create_time: chrono::DateTime<Utc>,
}

/// Orchestrator over the task store and the message bus.
#[derive(Clone)]
pub struct TaskService {
    store: TaskStore,
    bus: Arc<dyn MessageBus>,
    audio_source_path: PathBuf,
}

impl TaskService {
    pub fn new(store: TaskStore, bus: Arc<dyn MessageBus>, audio_source_path: PathBuf) -> Self {
        Self {
            store,
            bus,
            audio_source_path,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Create a task and start the pipeline.
    ///
    /// Validates the request, persists a CREATED row with the file count,
    /// publishes `task.created`, then moves the row to PROCESSING. If the
    /// publish fails the row is rolled to FAILED with the reason and the
    /// error is returned.
    pub async fn create_task(&self, request: &CreateTaskRequest) -> Result<CreatedTask> {
        validate_languages(&request.source_language, &request.target_languages)?;

        let audio_directory_path = self.audio_source_path.join(&request.audio_directory);
        let total_files = count_audio_files(&audio_directory_path)?;

        let task_id = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let task = TranslationTask {
            id: 0,
            task_id: task_id.clone(),
            task_type: task_type::AUDIO_TRANSLATION.to_string(),
            audio_directory_path: audio_directory_path.display().to_string(),
            source_language: request.source_language.clone(),
            target_languages: join_languages(&request.target_languages),
            status: TaskStatus::Created,
            total_files,
            processed_files: 0,
            success_files: 0,
            failed_files: 0,
            progress_percent: 0.0,
            error_message: None,
            result_file_path: None,
            priority: request.priority,
            create_time: now,
            update_time: now,
            start_time: None,
            complete_time: None,
        };
        self.store.insert(&task).await?;
        info!(
            "task created: taskId={task_id}, audioDirectory={}, totalFiles={total_files}",
            request.audio_directory
        );

        let message = TaskCreatedMessage {
            task_id: task_id.clone(),
            audio_directory_path: task.audio_directory_path.clone(),
            source_language: task.source_language.clone(),
            target_languages: task.target_languages.clone(),
            task_type: task.task_type.clone(),
            created_time: Utc::now(),
            priority: task.priority,
        };

        match publish_json(self.bus.as_ref(), topics::TASK_CREATED, &task_id, &message).await {
            Ok(()) => {
                info!("published task created message: taskId={task_id}");
                self.store
                    .update_status(&task_id, TaskStatus::Processing, None)
                    .await?;
            }
            Err(e) => {
                error!("failed to publish task created message: taskId={task_id}: {e}");
                self.store
                    .update_status(
                        &task_id,
                        TaskStatus::Failed,
                        Some(&format!("failed to publish task message: {e}")),
                    )
                    .await?;
                return Err(Error::Bus(format!("failed to start task processing: {e}")));
            }
        }

        Ok(CreatedTask {
            task_id,
            audio_directory: request.audio_directory.clone(),
            total_files,
            status: TaskStatus::Processing,
            create_time: now,
        })
    }

    /// Cancel a task. Succeeds only from non-terminal states; cancellation
    /// is advisory and does not interrupt an in-flight stage.
    pub async fn cancel_task(&self, task_id: &str) -> Result<bool> {
        let task = match self.store.get(task_id).await? {
            Some(task) => task,
            None => return Ok(false),
        };
        if !task.status.can_cancel() {
            return Ok(false);
        }
        self.store
            .update_status(task_id, TaskStatus::Cancelled, None)
            .await
    }

    /// Restart a FAILED or CANCELLED task as a fresh run with the same
    /// task id: counters and error reset, initiating message republished.
    pub async fn restart_task(&self, task_id: &str) -> Result<bool> {
        let task = match self.store.get(task_id).await? {
            Some(task) => task,
            None => return Ok(false),
        };
        if !task.status.can_restart() {
            return Ok(false);
        }

        if !self.store.reset_for_restart(task_id).await? {
            return Ok(false);
        }

        let message = TaskCreatedMessage {
            task_id: task_id.to_string(),
            audio_directory_path: task.audio_directory_path.clone(),
            source_language: task.source_language.clone(),
            target_languages: task.target_languages.clone(),
            task_type: task.task_type.clone(),
            created_time: Utc::now(),
            priority: task.priority,
        };

        match publish_json(self.bus.as_ref(), topics::TASK_CREATED, task_id, &message).await {
            Ok(()) => {
                info!("republished task created message: taskId={task_id}");
                self.store
                    .update_status(task_id, TaskStatus::Processing, None)
                    .await?;
                Ok(true)
            }
            Err(e) => {
                error!("restart publish failed: taskId={task_id}: {e}");
                self.store
                    .update_status(
                        task_id,
                        TaskStatus::Failed,
                        Some(&format!("restart failed: {e}")),
                    )
                    .await?;
                Ok(false)
            }
        }
    }

    /// Status mutation requested by stage workers (or finalizers). The
    /// store is the single writer; stages never touch the row directly.
    pub async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        self.store.update_status(task_id, status, error_message).await
    }
}

fn validate_languages(source: &str, targets: &[String]) -> Result<()> {
    if !Language::is_supported(source) {
        return Err(Error::InvalidInput(format!(
            "unsupported source language: {source}"
        )));
    }
    if targets.is_empty() {
        return Err(Error::InvalidInput(
            "at least one target language is required".to_string(),
        ));
    }
    for target in targets {
        if !Language::is_supported(target) {
            return Err(Error::InvalidInput(format!(
                "unsupported target language: {target}"
            )));
        }
    }
    Ok(())
}

/// Count eligible audio files in the source directory. The directory must
/// exist and hold at least one `.mp3` file.
fn count_audio_files(dir: &Path) -> Result<i64> {
    if !dir.is_dir() {
        return Err(Error::InvalidInput(format!(
            "audio directory does not exist: {}",
            dir.display()
        )));
    }
    let count = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("mp3"))
                .unwrap_or(false)
        })
        .count() as i64;
    if count == 0 {
        return Err(Error::InvalidInput(format!(
            "no MP3 files in audio directory: {}",
            dir.display()
        )));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_validation_rejects_unknown_codes() {
        assert!(validate_languages("zh-CN", &["en".to_string()]).is_ok());
        assert!(validate_languages("xx", &["en".to_string()]).is_err());
        assert!(validate_languages("zh-CN", &[]).is_err());
        assert!(validate_languages("zh-CN", &["en".to_string(), "xx".to_string()]).is_err());
    }

    #[test]
    fn audio_file_count_requires_mp3s() {
        let dir = tempfile::tempdir().unwrap();
        assert!(count_audio_files(dir.path()).is_err());

        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        assert!(count_audio_files(dir.path()).is_err());

        std::fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("b.MP3"), b"x").unwrap();
        assert_eq!(count_audio_files(dir.path()).unwrap(), 2);
    }

    #[test]
    fn missing_directory_is_invalid_input() {
        let err = count_audio_files(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
