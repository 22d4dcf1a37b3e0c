//! Durable, time-delayed job scheduling.
//!
//! The scheduler accepts `(fire time, kind, payload)` tuples, records them in
//! a [`JobStore`], and invokes the handler registered for the kind once the
//! wall clock reaches the fire time. A background task polls the store on a
//! fixed interval (default one minute), so firing carries up to that interval
//! of jitter — an accepted imprecision, not a hidden one.
//!
//! Delivery is at-least-once: a crash between running a handler and marking
//! the job done re-delivers on restart, and handlers must tolerate re-sends.
//! Handler failures are logged and the job is marked failed; this crate adds
//! no retry of its own.
//!
//! # Lifecycle
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::{Duration, Utc};
//! use coldflow::scheduler::{InMemoryJobStore, JobScheduler};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = Arc::new(JobScheduler::new(Arc::new(InMemoryJobStore::new())));
//! // scheduler.define("send email", handler) before starting;
//! let handle = scheduler.clone().start();
//!
//! scheduler
//!     .schedule(Utc::now() + Duration::hours(1), "send email", serde_json::json!({}))
//!     .await?;
//!
//! // ... application runs ...
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod store;
#[cfg(feature = "sqlite")]
mod store_sqlite;

pub use store::{
    InMemoryJobStore, JobId, JobRecord, JobStatus, JobStore, JobStoreError, NewJob, PayloadFilter,
};
#[cfg(feature = "sqlite")]
pub use store_sqlite::SqliteJobStore;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How many due jobs run through their handlers at once per poll.
const FIRE_CONCURRENCY: usize = 4;

/// Default store-polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Error returned by a [`JobHandler`].
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(coldflow::scheduler::handler))]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self {
            message: cause.to_string(),
        }
    }
}

/// Errors surfaced by the scheduler facade.
#[derive(Debug, Error, Diagnostic)]
pub enum SchedulerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] JobStoreError),
}

/// A unit of deferred work, invoked when a job of its kind comes due.
///
/// Handlers must tolerate duplicate delivery; the scheduler does not
/// deduplicate across restarts.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &JobRecord) -> Result<(), HandlerError>;
}

/// Schedules jobs and fires them through registered handlers.
pub struct JobScheduler {
    store: Arc<dyn JobStore>,
    handlers: RwLock<FxHashMap<String, Arc<dyn JobHandler>>>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl JobScheduler {
    #[must_use]
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            handlers: RwLock::new(FxHashMap::default()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Override the store-polling interval.
    ///
    /// Lower intervals tighten firing precision at the cost of more store
    /// traffic; the default is one minute.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Register the handler for `kind`. Exactly one handler per kind;
    /// re-registering replaces the previous one.
    pub fn define(&self, kind: impl Into<String>, handler: Arc<dyn JobHandler>) {
        let kind = kind.into();
        if self.handlers.write().insert(kind.clone(), handler).is_some() {
            warn!(%kind, "replacing existing job handler");
        }
    }

    /// Durably record a job to fire at `fire_at`.
    pub async fn schedule(
        &self,
        fire_at: DateTime<Utc>,
        kind: &str,
        payload: Value,
    ) -> Result<JobId, SchedulerError> {
        let id = self
            .store
            .insert(NewJob {
                kind: kind.to_string(),
                fire_at,
                payload,
            })
            .await?;
        debug!(job_id = %id, %kind, %fire_at, "job scheduled");
        Ok(id)
    }

    /// Delete every not-yet-fired job whose payload matches `filter`.
    pub async fn cancel(&self, filter: &PayloadFilter) -> Result<u64, SchedulerError> {
        let removed = self.store.cancel(filter).await?;
        if removed > 0 {
            debug!(removed, "cancelled pending jobs");
        }
        Ok(removed)
    }

    /// The underlying store, for inspection.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Fire everything due at `now` through its handler, with bounded
    /// concurrency. The background loop calls this every poll interval; it
    /// is public so callers can drain due jobs on demand.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        let due = self.store.due(now).await?;
        if due.is_empty() {
            return Ok(());
        }
        debug!(count = due.len(), "firing due jobs");
        futures_util::stream::iter(due)
            .for_each_concurrent(FIRE_CONCURRENCY, |job| self.fire(job))
            .await;
        Ok(())
    }

    async fn fire(&self, job: JobRecord) {
        let handler = self.handlers.read().get(&job.kind).cloned();
        let Some(handler) = handler else {
            warn!(job_id = %job.id, kind = %job.kind, "no handler registered for job kind");
            if let Err(e) = self.store.mark_failed(&job.id, "no handler registered").await {
                error!(job_id = %job.id, error = %e, "failed to record missing handler");
            }
            return;
        };

        match handler.run(&job).await {
            Ok(()) => {
                if let Err(e) = self.store.mark_done(&job.id).await {
                    error!(job_id = %job.id, error = %e, "failed to mark job done");
                }
            }
            Err(err) => {
                error!(job_id = %job.id, kind = %job.kind, error = %err, "job handler failed");
                if let Err(e) = self.store.mark_failed(&job.id, &err.message).await {
                    error!(job_id = %job.id, error = %e, "failed to mark job failed");
                }
            }
        }
    }

    /// Start the polling loop in a background task.
    ///
    /// Returns a [`SchedulerHandle`]; call `shutdown().await` for a clean
    /// stop. Handlers should be registered before starting.
    #[must_use]
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let shutdown = Arc::clone(&self.shutdown);
        let wake = Arc::clone(&self.wake);
        let handle = tokio::spawn(async move {
            info!(poll_interval = ?self.poll_interval, "job scheduler started");
            while !self.shutdown.load(Ordering::SeqCst) {
                if let Err(e) = self.poll_once(Utc::now()).await {
                    // Keep polling; due jobs are picked up on the next tick.
                    error!(error = %e, "job poll failed");
                }
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = self.wake.notified() => {}
                }
            }
            info!("job scheduler stopped");
        });
        SchedulerHandle {
            handle,
            shutdown,
            wake,
        }
    }
}

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for the current tick to finish.
    pub async fn shutdown(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();
        let _ = self.handle.await;
    }
}
