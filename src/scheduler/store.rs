//! Durable job storage: the [`JobStore`] capability trait and the in-memory
//! reference implementation.
//!
//! A job store records time-delayed jobs and hands back the ones that are
//! due. Any durable delayed-queue satisfies the contract; this crate ships
//! [`InMemoryJobStore`] for tests and development and a SQLite store (behind
//! the `sqlite` feature) for production.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Opaque job identifier assigned by the store.
pub type JobId = String;

/// Lifecycle of a stored job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Recorded, not yet fired.
    Pending,
    /// Handler completed successfully.
    Done,
    /// Handler failed (or no handler was registered); kept for inspection.
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// Decode a persisted status; unknown strings read as `Pending` so a
    /// forward-migrated row is re-delivered rather than dropped.
    #[must_use]
    pub fn decode(s: &str) -> Self {
        match s {
            "done" => JobStatus::Done,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

/// A job to be recorded.
#[derive(Clone, Debug)]
pub struct NewJob {
    pub kind: String,
    pub fire_at: DateTime<Utc>,
    pub payload: Value,
}

/// A stored job as the scheduler sees it.
#[derive(Clone, Debug)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: String,
    pub fire_at: DateTime<Utc>,
    pub payload: Value,
    pub status: JobStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Field-equality filter over job payloads.
///
/// A job matches when every listed top-level payload field equals the given
/// value. Used for batch cancellation, e.g. all jobs of one sequence:
///
/// ```rust
/// use coldflow::scheduler::PayloadFilter;
///
/// let filter = PayloadFilter::new().field_eq("sequenceId", "seq-1");
/// assert!(filter.matches(&serde_json::json!({"sequenceId": "seq-1", "nodeId": "n2"})));
/// assert!(!filter.matches(&serde_json::json!({"sequenceId": "other"})));
/// ```
#[derive(Clone, Debug, Default)]
pub struct PayloadFilter {
    fields: Vec<(String, Value)>,
}

impl PayloadFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `payload.<field> == value`.
    #[must_use]
    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    /// The field/value pairs of this filter.
    #[must_use]
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether `payload` satisfies every pair.
    #[must_use]
    pub fn matches(&self, payload: &Value) -> bool {
        self.fields
            .iter()
            .all(|(field, value)| payload.get(field) == Some(value))
    }
}

/// Errors surfaced by job stores.
#[derive(Debug, Error, Diagnostic)]
pub enum JobStoreError {
    /// The backing storage is unavailable or misbehaving.
    #[error("job store backend error: {message}")]
    #[diagnostic(code(coldflow::scheduler::backend))]
    Backend { message: String },
}

/// Capability interface over a durable delayed-job queue.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Durably record a job; returns its id.
    async fn insert(&self, job: NewJob) -> Result<JobId, JobStoreError>;

    /// All pending jobs whose fire time is at or before `now`, soonest first.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<JobRecord>, JobStoreError>;

    /// All pending jobs, soonest first.
    async fn pending(&self) -> Result<Vec<JobRecord>, JobStoreError>;

    /// Record successful completion. Idempotent; unknown ids are ignored.
    async fn mark_done(&self, id: &str) -> Result<(), JobStoreError>;

    /// Record a handler failure. Idempotent; unknown ids are ignored.
    async fn mark_failed(&self, id: &str, error: &str) -> Result<(), JobStoreError>;

    /// Delete all pending jobs matching `filter`; returns how many.
    async fn cancel(&self, filter: &PayloadFilter) -> Result<u64, JobStoreError>;
}

/// Volatile job store for tests and development.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<FxHashMap<JobId, JobRecord>>,
}

impl InMemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: NewJob) -> Result<JobId, JobStoreError> {
        let id = Uuid::new_v4().to_string();
        let record = JobRecord {
            id: id.clone(),
            kind: job.kind,
            fire_at: job.fire_at,
            payload: job.payload,
            status: JobStatus::Pending,
            last_error: None,
            created_at: Utc::now(),
        };
        self.jobs.lock().insert(id.clone(), record);
        Ok(id)
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<JobRecord>, JobStoreError> {
        let jobs = self.jobs.lock();
        let mut due: Vec<JobRecord> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending && j.fire_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|j| j.fire_at);
        Ok(due)
    }

    async fn pending(&self) -> Result<Vec<JobRecord>, JobStoreError> {
        let jobs = self.jobs.lock();
        let mut pending: Vec<JobRecord> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|j| j.fire_at);
        Ok(pending)
    }

    async fn mark_done(&self, id: &str) -> Result<(), JobStoreError> {
        if let Some(job) = self.jobs.lock().get_mut(id) {
            job.status = JobStatus::Done;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &str, error: &str) -> Result<(), JobStoreError> {
        if let Some(job) = self.jobs.lock().get_mut(id) {
            job.status = JobStatus::Failed;
            job.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn cancel(&self, filter: &PayloadFilter) -> Result<u64, JobStoreError> {
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, j| j.status != JobStatus::Pending || !filter.matches(&j.payload));
        Ok((before - jobs.len()) as u64)
    }
}
