/*!
SQLite job store.

Durable [`JobStore`] implementation backing the scheduler in production.
Jobs live in the `jobs` table; payloads are stored as JSON text and matched
for cancellation with `json_extract`, timestamps as fixed-width RFC 3339
text (see `db::encode_ts`).
*/

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;
use uuid::Uuid;

use super::store::{JobId, JobRecord, JobStatus, JobStore, JobStoreError, NewJob, PayloadFilter};
use crate::db::{self, DbError, decode_ts, encode_ts};

/// SQLite-backed job store.
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Wrap an existing pool (schema must already be migrated).
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect (or create) a SQLite database at `database_url` and migrate it.
    pub async fn connect(database_url: &str) -> Result<Self, JobStoreError> {
        let pool = db::connect(database_url)
            .await
            .map_err(JobStoreError::from)?;
        Ok(Self::new(pool))
    }

    fn row_to_record(row: &SqliteRow) -> JobRecord {
        let payload_json: String = row.get("payload_json");
        let payload: Value = serde_json::from_str(&payload_json).unwrap_or(Value::Null);
        let status: String = row.get("status");
        let fire_at: String = row.get("fire_at");
        let created_at: String = row.get("created_at");
        JobRecord {
            id: row.get("id"),
            kind: row.get("kind"),
            fire_at: decode_ts(&fire_at),
            payload,
            status: JobStatus::decode(&status),
            last_error: row.get("last_error"),
            created_at: decode_ts(&created_at),
        }
    }
}

impl From<DbError> for JobStoreError {
    fn from(e: DbError) -> Self {
        JobStoreError::Backend {
            message: e.to_string(),
        }
    }
}

fn backend(context: &str, e: sqlx::Error) -> JobStoreError {
    JobStoreError::Backend {
        message: format!("{context}: {e}"),
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    #[instrument(skip(self, job), fields(kind = %job.kind), err)]
    async fn insert(&self, job: NewJob) -> Result<JobId, JobStoreError> {
        let id = Uuid::new_v4().to_string();
        let payload_json = job.payload.to_string();
        sqlx::query(
            r#"
            INSERT INTO jobs (id, kind, fire_at, payload_json, status, created_at)
            VALUES (?1, ?2, ?3, ?4, 'pending', ?5)
            "#,
        )
        .bind(&id)
        .bind(&job.kind)
        .bind(encode_ts(job.fire_at))
        .bind(&payload_json)
        .bind(encode_ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| backend("insert job", e))?;
        Ok(id)
    }

    #[instrument(skip(self), err)]
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<JobRecord>, JobStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, fire_at, payload_json, status, last_error, created_at
            FROM jobs
            WHERE status = 'pending' AND fire_at <= ?1
            ORDER BY fire_at ASC
            "#,
        )
        .bind(encode_ts(now))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend("select due jobs", e))?;
        Ok(rows.iter().map(Self::row_to_record).collect())
    }

    #[instrument(skip(self), err)]
    async fn pending(&self) -> Result<Vec<JobRecord>, JobStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, fire_at, payload_json, status, last_error, created_at
            FROM jobs
            WHERE status = 'pending'
            ORDER BY fire_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend("select pending jobs", e))?;
        Ok(rows.iter().map(Self::row_to_record).collect())
    }

    #[instrument(skip(self), err)]
    async fn mark_done(&self, id: &str) -> Result<(), JobStoreError> {
        sqlx::query("UPDATE jobs SET status = 'done' WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| backend("mark done", e))?;
        Ok(())
    }

    #[instrument(skip(self, error), err)]
    async fn mark_failed(&self, id: &str, error: &str) -> Result<(), JobStoreError> {
        sqlx::query("UPDATE jobs SET status = 'failed', last_error = ?2 WHERE id = ?1")
            .bind(id)
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(|e| backend("mark failed", e))?;
        Ok(())
    }

    #[instrument(skip(self, filter), err)]
    async fn cancel(&self, filter: &PayloadFilter) -> Result<u64, JobStoreError> {
        if filter.is_empty() {
            return Ok(0);
        }

        // Build WHERE clause: status plus one json_extract equality per field.
        let mut conditions = vec!["status = 'pending'".to_string()];
        for (index, (field, _)) in filter.fields().iter().enumerate() {
            conditions.push(format!(
                "json_extract(payload_json, '$.{field}') = ?{}",
                index + 1
            ));
        }
        let sql = format!("DELETE FROM jobs WHERE {}", conditions.join(" AND "));

        let mut query = sqlx::query(&sql);
        for (_, value) in filter.fields() {
            query = match value {
                Value::String(s) => query.bind(s.as_str()),
                Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
                Value::Number(n) => query.bind(n.as_f64()),
                Value::Bool(b) => query.bind(*b),
                other => query.bind(other.to_string()),
            };
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| backend("cancel jobs", e))?;
        Ok(result.rows_affected())
    }
}
