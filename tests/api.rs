//! HTTP API round-trips against a real listener.

mod common;
use common::*;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use coldflow::compiler::CompileOptions;
use coldflow::scheduler::{InMemoryJobStore, JobScheduler, JobStore};
use coldflow::server::{self, AppState};
use coldflow::store::{InMemorySequenceStore, SequenceStore};

/// Serve the API on an ephemeral port; returns the base URL and the
/// scheduler for job-side assertions.
async fn spawn_server() -> (String, Arc<JobScheduler>) {
    let sequences: Arc<dyn SequenceStore> = Arc::new(InMemorySequenceStore::new());
    let scheduler = Arc::new(JobScheduler::new(Arc::new(InMemoryJobStore::new())));
    let state = AppState {
        sequences,
        scheduler: scheduler.clone(),
        compile_options: CompileOptions::default(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, server::router(state)).await {
            tracing::error!("test server error: {err:?}");
        }
    });

    (format!("http://{addr}"), scheduler)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn welcome_route_answers() {
    let (base, _) = spawn_server().await;
    let body: Value = reqwest::get(&base)
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert!(body["message"].as_str().expect("message").contains("coldflow"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn schedule_email_validates_required_fields() {
    let (base, scheduler) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/email/schedule"))
        .json(&json!({"subject": "Hi", "text": "no recipient"}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], json!("Missing required fields"));
    assert!(scheduler.store().pending().await.expect("pending").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn schedule_email_defaults_to_one_hour() {
    let (base, scheduler) = spawn_server().await;
    let client = reqwest::Client::new();

    let before = Utc::now();
    let response = client
        .post(format!("{base}/api/email/schedule"))
        .json(&json!({"to": "lead@example.com", "subject": "Hi", "text": "Hello"}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 200);

    let pending = scheduler.store().pending().await.expect("pending");
    assert_eq!(pending.len(), 1);
    let fire_at = pending[0].fire_at;
    assert!(fire_at >= before + Duration::hours(1));
    assert!(fire_at <= Utc::now() + Duration::hours(1));
    assert_eq!(pending[0].payload["to"], json!("lead@example.com"));
    assert_eq!(pending[0].payload["text"], json!("Hello"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn schedule_email_honors_explicit_time_and_rejects_garbage() {
    let (base, scheduler) = spawn_server().await;
    let client = reqwest::Client::new();

    let at = Utc::now() + Duration::hours(6);
    let response = client
        .post(format!("{base}/api/email/schedule"))
        .json(&json!({
            "to": "lead@example.com",
            "subject": "Hi",
            "text": "Hello",
            "scheduleTime": at.to_rfc3339(),
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 200);
    let pending = scheduler.store().pending().await.expect("pending");
    assert_eq!(pending[0].fire_at, at);

    let response = client
        .post(format!("{base}/api/email/schedule"))
        .json(&json!({
            "to": "lead@example.com",
            "subject": "Hi",
            "text": "Hello",
            "scheduleTime": "next tuesday",
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_sequence_compiles_and_schedules() {
    let (base, scheduler) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/sequence"))
        .json(&two_email_chain_body("Launch"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 201);
    let sequence: Value = response.json().await.expect("json");
    assert_eq!(sequence["name"], json!("Launch"));
    let id = sequence["id"].as_str().expect("id").to_string();

    let pending = scheduler.store().pending().await.expect("pending");
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|j| j.payload["sequenceId"] == json!(id)));
    // 2h then 5h offsets, soonest first.
    assert_eq!(pending[0].payload["subject"], json!("A"));
    assert_eq!(pending[1].payload["subject"], json!("B"));
    assert_eq!(
        (pending[1].fire_at - pending[0].fire_at),
        Duration::hours(3)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_sequence_rejects_branching_graphs() {
    let (base, scheduler) = spawn_server().await;
    let client = reqwest::Client::new();

    let graph = json!({
        "name": "Branchy",
        "nodes": [
            {"id": "start", "type": "input"},
            {"id": "a", "type": "coldEmail", "data": {"subject": "A"}},
            {"id": "b", "type": "coldEmail", "data": {"subject": "B"}}
        ],
        "edges": [
            {"id": "e1", "source": "start", "target": "a"},
            {"id": "e2", "source": "start", "target": "b"}
        ]
    });
    let response = client
        .post(format!("{base}/api/sequence"))
        .json(&graph)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);
    assert!(scheduler.store().pending().await.expect("pending").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn update_replaces_previously_scheduled_jobs() {
    let (base, scheduler) = spawn_server().await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{base}/api/sequence"))
        .json(&two_email_chain_body("Launch"))
        .send()
        .await
        .expect("create")
        .json()
        .await
        .expect("json");
    let id = created["id"].as_str().expect("id").to_string();
    assert_eq!(scheduler.store().pending().await.expect("pending").len(), 2);

    // Shrink the graph to a single email; old jobs must not linger.
    let update = json!({
        "name": "Launch v2",
        "nodes": [
            {"id": "start", "type": "input"},
            {"id": "only", "type": "coldEmail", "data": {"subject": "Only", "body": "one"}}
        ],
        "edges": [
            {"id": "e1", "source": "start", "target": "only"}
        ]
    });
    let response = client
        .put(format!("{base}/api/sequence/{id}"))
        .json(&update)
        .send()
        .await
        .expect("update");
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.expect("json");
    assert_eq!(updated["name"], json!("Launch v2"));

    let pending = scheduler.store().pending().await.expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].payload["subject"], json!("Only"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_cancels_all_jobs_for_the_sequence() {
    let (base, scheduler) = spawn_server().await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{base}/api/sequence"))
        .json(&two_email_chain_body("Launch"))
        .send()
        .await
        .expect("create")
        .json()
        .await
        .expect("json");
    let id = created["id"].as_str().expect("id").to_string();

    let response = client
        .delete(format!("{base}/api/sequence/{id}"))
        .send()
        .await
        .expect("delete");
    assert_eq!(response.status(), 200);
    assert!(scheduler.store().pending().await.expect("pending").is_empty());

    let response = reqwest::get(format!("{base}/api/sequence/{id}"))
        .await
        .expect("get");
    assert_eq!(response.status(), 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_sequence_id_is_404_for_get_put_delete() {
    let (base, _) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = reqwest::get(format!("{base}/api/sequence/ghost"))
        .await
        .expect("get");
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], json!("Sequence not found"));

    let response = client
        .put(format!("{base}/api/sequence/ghost"))
        .json(&json!({"nodes": [], "edges": []}))
        .send()
        .await
        .expect("put");
    assert_eq!(response.status(), 404);

    let response = client
        .delete(format!("{base}/api/sequence/ghost"))
        .send()
        .await
        .expect("delete");
    assert_eq!(response.status(), 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn list_orders_by_most_recently_updated() {
    let (base, _) = spawn_server().await;
    let client = reqwest::Client::new();

    for name in ["one", "two"] {
        client
            .post(format!("{base}/api/sequence"))
            .json(&two_email_chain_body(name))
            .send()
            .await
            .expect("create");
    }

    let listed: Vec<Value> = reqwest::get(format!("{base}/api/sequence"))
        .await
        .expect("list")
        .json()
        .await
        .expect("json");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["name"], json!("two"));
    assert_eq!(listed[1]["name"], json!("one"));
}
