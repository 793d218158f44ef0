//! Task service integration tests

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use polyglot_common::bus::{MemoryBus, MessageBus, Subscription};
use polyglot_common::messages::TaskCreatedMessage;
use polyglot_common::task::TaskStatus;
use polyglot_common::{topics, Error, Result};
use polyglot_task::service::{CreateTaskRequest, TaskService};
use polyglot_task::store::{self, TaskQuery, TaskStore};

/// Bus double whose publish always fails; subscribe still works.
struct FailingBus {
    inner: MemoryBus,
}

#[async_trait]
impl MessageBus for FailingBus {
    async fn publish(&self, _topic: &str, _key: &str, _payload: Vec<u8>) -> Result<()> {
        Err(Error::Bus("broker unreachable".to_string()))
    }

    async fn subscribe(&self, topic: &str, group: &str) -> Result<Subscription> {
        self.inner.subscribe(topic, group).await
    }
}

fn seed_audio(root: &Path, name: &str, files: usize) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    for i in 0..files {
        std::fs::write(dir.join(format!("clip{i}.mp3")), b"audio").unwrap();
    }
}

fn request(dir: &str, source: &str, targets: &[&str]) -> CreateTaskRequest {
    CreateTaskRequest {
        audio_directory: dir.to_string(),
        source_language: source.to_string(),
        target_languages: targets.iter().map(|t| t.to_string()).collect(),
        priority: 5,
    }
}

async fn service(bus: Arc<dyn MessageBus>, root: &Path) -> TaskService {
    let pool = store::connect_in_memory().await.unwrap();
    TaskService::new(TaskStore::new(pool), bus, root.to_path_buf())
}

#[tokio::test]
async fn create_publishes_and_moves_to_processing() {
    let root = tempfile::tempdir().unwrap();
    seed_audio(root.path(), "show1", 3);
    let bus = Arc::new(MemoryBus::new());
    let service = service(bus.clone(), root.path()).await;

    let created = service
        .create_task(&request("show1", "zh-CN", &["en", "ja"]))
        .await
        .unwrap();
    assert_eq!(created.total_files, 3);
    assert_eq!(created.status, TaskStatus::Processing);

    let task = service.store().get(&created.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Processing);
    assert_eq!(task.target_languages, "en,ja");
    assert!(task.start_time.is_some());
    assert!(task.complete_time.is_none());

    let published = bus.published(topics::TASK_CREATED);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].key, created.task_id);
    let message: TaskCreatedMessage = serde_json::from_slice(&published[0].payload).unwrap();
    assert_eq!(message.task_id, created.task_id);
    assert_eq!(message.source_language, "zh-CN");
    assert_eq!(message.target_languages, "en,ja");
}

#[tokio::test]
async fn create_rejects_invalid_requests() {
    let root = tempfile::tempdir().unwrap();
    seed_audio(root.path(), "show1", 1);
    let bus = Arc::new(MemoryBus::new());
    let service = service(bus.clone(), root.path()).await;

    for bad in [
        request("show1", "xx", &["en"]),
        request("show1", "zh-CN", &[]),
        request("show1", "zh-CN", &["xx"]),
        request("missing", "zh-CN", &["en"]),
    ] {
        let err = service.create_task(&bad).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{bad:?}");
    }

    // Rejected requests leave no row and publish nothing.
    let page = service
        .store()
        .list(&TaskQuery {
            page: 1,
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(bus.published(topics::TASK_CREATED).is_empty());
}

#[tokio::test]
async fn publish_failure_rolls_the_row_to_failed() {
    let root = tempfile::tempdir().unwrap();
    seed_audio(root.path(), "show1", 2);
    let bus = Arc::new(FailingBus {
        inner: MemoryBus::new(),
    });
    let service = service(bus, root.path()).await;

    let err = service
        .create_task(&request("show1", "zh-CN", &["en"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Bus(_)));

    let page = service
        .store()
        .list(&TaskQuery {
            page: 1,
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    let task = &page.records[0];
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error_message.as_deref().unwrap().contains("publish"));
}

#[tokio::test]
async fn cancel_only_from_non_terminal_states() {
    let root = tempfile::tempdir().unwrap();
    seed_audio(root.path(), "show1", 1);
    let bus = Arc::new(MemoryBus::new());
    let service = service(bus, root.path()).await;

    assert!(!service.cancel_task("no-such-task").await.unwrap());

    let created = service
        .create_task(&request("show1", "zh-CN", &["en"]))
        .await
        .unwrap();
    assert!(service.cancel_task(&created.task_id).await.unwrap());
    let task = service.store().get(&created.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(task.complete_time.is_some());

    // Terminal states refuse a second cancel.
    assert!(!service.cancel_task(&created.task_id).await.unwrap());

    service
        .update_status(&created.task_id, TaskStatus::Completed, None)
        .await
        .unwrap();
    assert!(!service.cancel_task(&created.task_id).await.unwrap());
}

#[tokio::test]
async fn restart_resets_and_republishes() {
    let root = tempfile::tempdir().unwrap();
    seed_audio(root.path(), "show1", 2);
    let bus = Arc::new(MemoryBus::new());
    let service = service(bus.clone(), root.path()).await;

    let created = service
        .create_task(&request("show1", "zh-CN", &["en"]))
        .await
        .unwrap();

    // Active tasks cannot restart.
    assert!(!service.restart_task(&created.task_id).await.unwrap());
    assert!(!service.restart_task("no-such-task").await.unwrap());

    service
        .update_status(
            &created.task_id,
            TaskStatus::Failed,
            Some("speech stage exploded"),
        )
        .await
        .unwrap();

    assert!(service.restart_task(&created.task_id).await.unwrap());
    let task = service.store().get(&created.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Processing);
    assert_eq!(task.processed_files, 0);
    assert_eq!(task.progress_percent, 0.0);
    assert!(task.error_message.is_none());
    assert!(task.complete_time.is_none());

    // One initial publish plus one replay.
    assert_eq!(bus.published(topics::TASK_CREATED).len(), 2);
}

#[tokio::test]
async fn listing_filters_and_statistics_count() {
    let root = tempfile::tempdir().unwrap();
    seed_audio(root.path(), "show1", 1);
    seed_audio(root.path(), "show2", 1);
    let bus = Arc::new(MemoryBus::new());
    let service = service(bus, root.path()).await;

    let first = service
        .create_task(&request("show1", "zh-CN", &["en"]))
        .await
        .unwrap();
    let second = service
        .create_task(&request("show2", "ja", &["zh-TW"]))
        .await
        .unwrap();
    service
        .update_status(&second.task_id, TaskStatus::Completed, None)
        .await
        .unwrap();

    let processing = service
        .store()
        .list(&TaskQuery {
            page: 1,
            page_size: 10,
            status: Some(TaskStatus::Processing),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(processing.total, 1);
    assert_eq!(processing.records[0].task_id, first.task_id);

    let by_target = service
        .store()
        .list(&TaskQuery {
            page: 1,
            page_size: 10,
            target_language: Some("zh-TW".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_target.total, 1);
    assert_eq!(by_target.records[0].task_id, second.task_id);

    let stats = service.store().statistics().await.unwrap();
    assert_eq!(stats.total_tasks, 2);
    assert_eq!(stats.today_tasks, 2);
    assert_eq!(stats.status_counts.get("PROCESSING"), Some(&1));
    assert_eq!(stats.status_counts.get("COMPLETED"), Some(&1));
}
