//! Scheduler behavior over the in-memory job store: firing, failure
//! bookkeeping, cancellation, and the background polling loop.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use serde_json::json;

use coldflow::mailer::{MemoryMailer, SEND_EMAIL_KIND, SendEmailHandler};
use coldflow::scheduler::{InMemoryJobStore, JobScheduler, JobStatus, JobStore, PayloadFilter};

fn email_scheduler(mailer: Arc<MemoryMailer>) -> Arc<JobScheduler> {
    let scheduler = Arc::new(JobScheduler::new(Arc::new(InMemoryJobStore::new())));
    scheduler.define(SEND_EMAIL_KIND, Arc::new(SendEmailHandler::new(mailer)));
    scheduler
}

#[tokio::test]
async fn due_job_fires_through_handler() {
    let mailer = Arc::new(MemoryMailer::new());
    let scheduler = email_scheduler(mailer.clone());

    let now = Utc::now();
    scheduler
        .schedule(
            now - Duration::seconds(1),
            SEND_EMAIL_KIND,
            json!({"to": "lead@example.com", "subject": "Hi", "text": "Hello"}),
        )
        .await
        .expect("schedule");

    scheduler.poll_once(now).await.expect("poll");

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "lead@example.com");
    assert_eq!(sent[0].body, "Hello");
    assert!(scheduler.store().pending().await.expect("pending").is_empty());
}

#[tokio::test]
async fn future_job_does_not_fire_early() {
    let mailer = Arc::new(MemoryMailer::new());
    let scheduler = email_scheduler(mailer.clone());

    let now = Utc::now();
    scheduler
        .schedule(
            now + Duration::hours(2),
            SEND_EMAIL_KIND,
            json!({"to": "lead@example.com", "subject": "Hi", "text": "Hello"}),
        )
        .await
        .expect("schedule");

    scheduler.poll_once(now).await.expect("poll");
    assert!(mailer.sent().is_empty());
    assert_eq!(scheduler.store().pending().await.expect("pending").len(), 1);
}

#[tokio::test]
async fn fired_job_is_not_redelivered_next_poll() {
    let mailer = Arc::new(MemoryMailer::new());
    let scheduler = email_scheduler(mailer.clone());

    let now = Utc::now();
    scheduler
        .schedule(
            now,
            SEND_EMAIL_KIND,
            json!({"to": "lead@example.com", "subject": "Hi", "text": "Hello"}),
        )
        .await
        .expect("schedule");

    scheduler.poll_once(now).await.expect("first poll");
    scheduler.poll_once(now).await.expect("second poll");
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn handler_failure_marks_job_failed_without_retry() {
    let mailer = Arc::new(MemoryMailer::new());
    mailer.fail_with("mailbox on fire");
    let scheduler = email_scheduler(mailer.clone());

    let now = Utc::now();
    let id = scheduler
        .schedule(
            now,
            SEND_EMAIL_KIND,
            json!({"to": "lead@example.com", "subject": "Hi", "text": "Hello"}),
        )
        .await
        .expect("schedule");

    scheduler.poll_once(now).await.expect("poll");
    // Failed, not pending: the next poll must not re-run it.
    scheduler.poll_once(now).await.expect("second poll");
    assert!(mailer.sent().is_empty());

    let due = scheduler.store().due(now).await.expect("due");
    assert!(due.iter().all(|j| j.id != id));
}

#[tokio::test]
async fn missing_recipient_marks_job_failed() {
    let mailer = Arc::new(MemoryMailer::new());
    let scheduler = email_scheduler(mailer.clone());

    let now = Utc::now();
    // Sequence-derived payload shape: no `to` field.
    scheduler
        .schedule(
            now,
            SEND_EMAIL_KIND,
            json!({"sequenceId": "seq-1", "nodeId": "a", "subject": "A", "body": "first"}),
        )
        .await
        .expect("schedule");

    scheduler.poll_once(now).await.expect("poll");
    assert!(mailer.sent().is_empty());
    assert!(scheduler.store().pending().await.expect("pending").is_empty());
}

#[tokio::test]
async fn job_without_handler_is_marked_failed() {
    let scheduler = Arc::new(JobScheduler::new(Arc::new(InMemoryJobStore::new())));
    let now = Utc::now();
    scheduler
        .schedule(now, "unknown kind", json!({}))
        .await
        .expect("schedule");

    scheduler.poll_once(now).await.expect("poll");
    assert!(scheduler.store().pending().await.expect("pending").is_empty());
}

#[tokio::test]
async fn cancel_by_sequence_id_prevents_firing() {
    let mailer = Arc::new(MemoryMailer::new());
    let scheduler = email_scheduler(mailer.clone());

    let now = Utc::now();
    for (seq, to) in [("seq-1", "a@example.com"), ("seq-2", "b@example.com")] {
        scheduler
            .schedule(
                now,
                SEND_EMAIL_KIND,
                json!({"sequenceId": seq, "to": to, "subject": "Hi", "body": "Hello"}),
            )
            .await
            .expect("schedule");
    }

    let removed = scheduler
        .cancel(&PayloadFilter::new().field_eq("sequenceId", "seq-1"))
        .await
        .expect("cancel");
    assert_eq!(removed, 1);

    scheduler.poll_once(now).await.expect("poll");
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "b@example.com");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn polling_loop_fires_and_shuts_down() {
    let mailer = Arc::new(MemoryMailer::new());
    let store = Arc::new(InMemoryJobStore::new());
    let scheduler = Arc::new(
        JobScheduler::new(store).with_poll_interval(StdDuration::from_millis(20)),
    );
    scheduler.define(SEND_EMAIL_KIND, Arc::new(SendEmailHandler::new(mailer.clone())));

    scheduler
        .schedule(
            Utc::now(),
            SEND_EMAIL_KIND,
            json!({"to": "loop@example.com", "subject": "Hi", "text": "Hello"}),
        )
        .await
        .expect("schedule");

    let handle = scheduler.clone().start();
    tokio::time::sleep(StdDuration::from_millis(200)).await;
    handle.shutdown().await;

    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn duplicate_delivery_is_tolerated_by_the_handler() {
    // At-least-once: run the same record twice through the handler directly.
    use coldflow::scheduler::{JobHandler, JobRecord};

    let mailer = Arc::new(MemoryMailer::new());
    let handler = SendEmailHandler::new(mailer.clone());
    let record = JobRecord {
        id: "job-1".to_string(),
        kind: SEND_EMAIL_KIND.to_string(),
        fire_at: Utc::now(),
        payload: json!({"to": "dup@example.com", "subject": "Hi", "text": "Hello"}),
        status: JobStatus::Pending,
        last_error: None,
        created_at: Utc::now(),
    };

    handler.run(&record).await.expect("first delivery");
    handler.run(&record).await.expect("redelivery");
    assert_eq!(mailer.sent().len(), 2);
}
