//! Task store
//!
//! SQLite-backed record of one task per pipeline run. This is the sole
//! source of truth for task status and progress; all mutation goes through
//! the methods here (single-writer discipline), while status queries may
//! run concurrently.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use polyglot_common::task::{progress_percent, TaskStatus, TranslationTask};
use polyglot_common::{Error, Result};

/// Connect to (creating if needed) the task database at `db_path` and make
/// sure the schema exists.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new task database: {}", db_path.display());
    } else {
        info!("Opened existing task database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    // WAL lets status queries run while a writer holds the row
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database for tests. Single connection: every pooled
/// connection would otherwise get its own empty database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS translation_task (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id TEXT NOT NULL UNIQUE,
            task_type TEXT NOT NULL,
            audio_directory_path TEXT NOT NULL,
            source_language TEXT NOT NULL,
            target_languages TEXT NOT NULL,
            status TEXT NOT NULL,
            total_files INTEGER NOT NULL DEFAULT 0,
            processed_files INTEGER NOT NULL DEFAULT 0,
            success_files INTEGER NOT NULL DEFAULT 0,
            failed_files INTEGER NOT NULL DEFAULT 0,
            progress_percent REAL NOT NULL DEFAULT 0,
            error_message TEXT,
            result_file_path TEXT,
            priority INTEGER NOT NULL DEFAULT 5,
            create_time TEXT NOT NULL,
            update_time TEXT NOT NULL,
            start_time TEXT,
            complete_time TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_translation_task_status ON translation_task(status)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_translation_task_create_time \
         ON translation_task(create_time)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Query parameters for task listing.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    /// 1-based page number (0 treated as 1).
    pub page: i64,
    pub page_size: i64,
    /// Substring match on task id.
    pub task_id_like: Option<String>,
    pub status: Option<TaskStatus>,
    pub source_language: Option<String>,
    /// Substring match against the comma-joined target list.
    pub target_language: Option<String>,
    /// Sort ascending by create time (default: descending).
    pub ascending: bool,
}

/// One page of task records.
#[derive(Debug, Clone)]
pub struct TaskPage {
    pub records: Vec<TranslationTask>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Aggregate task counts for dashboards.
#[derive(Debug, Clone)]
pub struct TaskStatistics {
    pub total_tasks: i64,
    pub status_counts: HashMap<String, i64>,
    pub today_tasks: i64,
}

/// Handle over the task table.
#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, task: &TranslationTask) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO translation_task (
                task_id, task_type, audio_directory_path, source_language,
                target_languages, status, total_files, processed_files,
                success_files, failed_files, progress_percent, error_message,
                result_file_path, priority, create_time, update_time,
                start_time, complete_time
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.task_id)
        .bind(&task.task_type)
        .bind(&task.audio_directory_path)
        .bind(&task.source_language)
        .bind(&task.target_languages)
        .bind(task.status.as_str())
        .bind(task.total_files)
        .bind(task.processed_files)
        .bind(task.success_files)
        .bind(task.failed_files)
        .bind(task.progress_percent)
        .bind(&task.error_message)
        .bind(&task.result_file_path)
        .bind(task.priority)
        .bind(task.create_time)
        .bind(task.update_time)
        .bind(task.start_time)
        .bind(task.complete_time)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, task_id: &str) -> Result<Option<TranslationTask>> {
        let row = sqlx::query("SELECT * FROM translation_task WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| task_from_row(&r)).transpose()
    }

    /// Single mutation point for task status.
    ///
    /// Stamps `start_time` on entry to PROCESSING and `complete_time` on
    /// any terminal state. `error_message`, when given, replaces the stored
    /// one. Transitions are advisory here: the caller decides legality, and
    /// a late finalizer can overwrite CANCELLED (known gap, preserved).
    pub async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let now = Utc::now();
        let start_time = matches!(status, TaskStatus::Processing).then_some(now);
        let complete_time = status.is_terminal().then_some(now);

        let result = sqlx::query(
            r#"
            UPDATE translation_task SET
                status = ?,
                update_time = ?,
                error_message = COALESCE(?, error_message),
                start_time = COALESCE(?, start_time),
                complete_time = COALESCE(?, complete_time)
            WHERE task_id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(error_message)
        .bind(start_time)
        .bind(complete_time)
        .bind(task_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!("task status updated: taskId={task_id}, status={status}");
        }
        Ok(result.rows_affected() > 0)
    }

    /// Reset progress fields for a restart: counters and error cleared,
    /// status back to CREATED, start/complete times dropped.
    pub async fn reset_for_restart(&self, task_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE translation_task SET
                status = ?,
                processed_files = 0,
                success_files = 0,
                failed_files = 0,
                progress_percent = 0,
                error_message = NULL,
                start_time = NULL,
                complete_time = NULL,
                update_time = ?
            WHERE task_id = ?
            "#,
        )
        .bind(TaskStatus::Created.as_str())
        .bind(Utc::now())
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Finalize a successful run: record file counters against the stored
    /// total (`processed = success + failed` holds from here on), set
    /// progress to 100 and status to COMPLETED.
    pub async fn record_completion(&self, task_id: &str, success_files: i64) -> Result<bool> {
        let task = match self.get(task_id).await? {
            Some(task) => task,
            None => return Ok(false),
        };
        let total = task.total_files;
        let success = success_files.min(total);
        let failed = total - success;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE translation_task SET
                status = ?,
                processed_files = ?,
                success_files = ?,
                failed_files = ?,
                progress_percent = ?,
                update_time = ?,
                complete_time = ?
            WHERE task_id = ?
            "#,
        )
        .bind(TaskStatus::Completed.as_str())
        .bind(total)
        .bind(success)
        .bind(failed)
        .bind(progress_percent(total, total))
        .bind(now)
        .bind(now)
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(&self, query: &TaskQuery) -> Result<TaskPage> {
        let mut conditions = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(task_id_like) = &query.task_id_like {
            conditions.push("task_id LIKE ?");
            binds.push(format!("%{task_id_like}%"));
        }
        if let Some(status) = query.status {
            conditions.push("status = ?");
            binds.push(status.as_str().to_string());
        }
        if let Some(source) = &query.source_language {
            conditions.push("source_language = ?");
            binds.push(source.clone());
        }
        if let Some(target) = &query.target_language {
            conditions.push("target_languages LIKE ?");
            binds.push(format!("%{target}%"));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let order = if query.ascending { "ASC" } else { "DESC" };
        let page = query.page.max(1);
        let page_size = query.page_size.max(1);
        let offset = (page - 1) * page_size;

        let count_sql = format!("SELECT COUNT(*) FROM translation_task{where_clause}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let list_sql = format!(
            "SELECT * FROM translation_task{where_clause} \
             ORDER BY create_time {order} LIMIT ? OFFSET ?"
        );
        let mut list_query = sqlx::query(&list_sql);
        for bind in &binds {
            list_query = list_query.bind(bind);
        }
        let rows = list_query
            .bind(page_size)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let records = rows
            .iter()
            .map(task_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(TaskPage {
            records,
            total,
            page,
            page_size,
        })
    }

    pub async fn statistics(&self) -> Result<TaskStatistics> {
        let total_tasks = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM translation_task")
            .fetch_one(&self.pool)
            .await?;

        let mut status_counts = HashMap::new();
        let rows =
            sqlx::query("SELECT status, COUNT(*) AS n FROM translation_task GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("n")?;
            status_counts.insert(status, count);
        }

        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);
        let today_tasks = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM translation_task WHERE create_time >= ?",
        )
        .bind(midnight)
        .fetch_one(&self.pool)
        .await?;

        Ok(TaskStatistics {
            total_tasks,
            status_counts,
            today_tasks,
        })
    }
}

fn task_from_row(row: &SqliteRow) -> Result<TranslationTask> {
    let status: String = row.try_get("status")?;
    Ok(TranslationTask {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        task_type: row.try_get("task_type")?,
        audio_directory_path: row.try_get("audio_directory_path")?,
        source_language: row.try_get("source_language")?,
        target_languages: row.try_get("target_languages")?,
        status: status
            .parse()
            .map_err(|_| Error::Internal(format!("corrupt status in store: {status}")))?,
        total_files: row.try_get("total_files")?,
        processed_files: row.try_get("processed_files")?,
        success_files: row.try_get("success_files")?,
        failed_files: row.try_get("failed_files")?,
        progress_percent: row.try_get("progress_percent")?,
        error_message: row.try_get("error_message")?,
        result_file_path: row.try_get("result_file_path")?,
        priority: row.try_get("priority")?,
        create_time: row.try_get::<DateTime<Utc>, _>("create_time")?,
        update_time: row.try_get::<DateTime<Utc>, _>("update_time")?,
        start_time: row.try_get::<Option<DateTime<Utc>>, _>("start_time")?,
        complete_time: row.try_get::<Option<DateTime<Utc>>, _>("complete_time")?,
    })
}
