use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::instrument;

use crate::error::StoreError;
use crate::model::{JobRecord, StoredJobRecord};

pub type Pool = SqlitePool;

/// Keyed job-status records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create the record or overwrite its `status` and `job_id`.
    async fn upsert(&self, record: &JobRecord) -> Result<(), StoreError>;

    async fn get(&self, unique_id: &str) -> Result<Option<StoredJobRecord>, StoreError>;

    /// Set `status` only if it currently equals `expected`. Returns whether a
    /// record changed.
    async fn update_status_if(
        &self,
        unique_id: &str,
        expected: &str,
        status: &str,
    ) -> Result<bool, StoreError>;
}

pub async fn init_pool(database_url: &str) -> Result<Pool, StoreError> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    if !normalized.starts_with("sqlite::memory") {
        sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous=FULL;").execute(&pool).await?;
    }
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(e.into()))
}

/// For file-backed SQLite URLs, expand a leading `~/` and ensure the parent
/// directory exists. SQLite neither expands `~` nor creates directories, and
/// `storage.database_url` / `DATABASE_URL` commonly point at `~/...` or a
/// not-yet-created data dir. In-memory and non-sqlite URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: Pool,
}

impl SqliteRecordStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Open the database at `database_url` and apply migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = init_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn map_record(row: SqliteRow) -> Result<StoredJobRecord, sqlx::Error> {
    Ok(StoredJobRecord {
        record: JobRecord {
            unique_id: row.try_get("unique_id")?,
            status: row.try_get("status")?,
            job_id: row.try_get("job_id")?,
        },
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    #[instrument(skip_all, fields(unique_id = %record.unique_id))]
    async fn upsert(&self, record: &JobRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO job_records (unique_id, status, job_id, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(unique_id) DO UPDATE SET status = excluded.status, job_id = excluded.job_id",
        )
        .bind(&record.unique_id)
        .bind(&record.status)
        .bind(&record.job_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, unique_id: &str) -> Result<Option<StoredJobRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT unique_id, status, job_id, created_at FROM job_records WHERE unique_id = ?",
        )
        .bind(unique_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(map_record).transpose()?)
    }

    #[instrument(skip(self))]
    async fn update_status_if(
        &self,
        unique_id: &str,
        expected: &str,
        status: &str,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query("UPDATE job_records SET status = ? WHERE unique_id = ? AND status = ?")
            .bind(status)
            .bind(unique_id)
            .bind(expected)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() == 1)
    }
}
