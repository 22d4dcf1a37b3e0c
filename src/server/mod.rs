//! HTTP surface: ad hoc email scheduling and sequence CRUD.
//!
//! The route layer owns the only orchestration in the system: on create it
//! compiles the submitted graph and schedules the resulting jobs; on update
//! it first cancels the sequence's pending jobs, then recompiles and
//! reschedules; on delete it cancels. Cancel-then-reschedule is not atomic —
//! a crash in between leaves the sequence with no active jobs, an
//! acknowledged inconsistency window.

mod error;

pub use error::ApiError;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::compiler::{CompileOptions, compile};
use crate::graph::{Edge, Node, SequenceGraph};
use crate::mailer::{SEND_EMAIL_KIND, SendPayload};
use crate::scheduler::{JobScheduler, PayloadFilter};
use crate::store::{Sequence, SequenceStore};

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub sequences: Arc<dyn SequenceStore>,
    pub scheduler: Arc<JobScheduler>,
    pub compile_options: CompileOptions,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/api/email/schedule", post(schedule_email))
        .route("/api/sequence", get(list_sequences).post(create_sequence))
        .route(
            "/api/sequence/{id}",
            get(get_sequence)
                .put(update_sequence)
                .delete(delete_sequence),
        )
        .with_state(state)
}

async fn welcome() -> Json<Value> {
    Json(json!({ "message": "Welcome to the coldflow email sequence API" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleEmailRequest {
    to: Option<String>,
    subject: Option<String>,
    text: Option<String>,
    schedule_time: Option<String>,
}

async fn schedule_email(
    State(state): State<AppState>,
    Json(request): Json<ScheduleEmailRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(to), Some(subject), Some(text)) = (request.to, request.subject, request.text) else {
        return Err(ApiError::Validation("Missing required fields".to_string()));
    };

    let fire_at = match request.schedule_time {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ApiError::Validation("Invalid scheduleTime".to_string()))?,
        None => Utc::now() + Duration::hours(1),
    };

    let payload = SendPayload {
        to: Some(to),
        subject: Some(subject),
        text: Some(text),
        ..SendPayload::default()
    };
    state
        .scheduler
        .schedule(fire_at, SEND_EMAIL_KIND, to_payload_value(&payload)?)
        .await?;

    Ok(Json(json!({ "message": "Email scheduled successfully" })))
}

#[derive(Debug, Deserialize)]
struct SequenceRequest {
    name: Option<String>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
}

async fn list_sequences(State(state): State<AppState>) -> Result<Json<Vec<Sequence>>, ApiError> {
    Ok(Json(state.sequences.list().await?))
}

async fn get_sequence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Sequence>, ApiError> {
    Ok(Json(state.sequences.get(&id).await?))
}

async fn create_sequence(
    State(state): State<AppState>,
    Json(request): Json<SequenceRequest>,
) -> Result<(StatusCode, Json<Sequence>), ApiError> {
    validate_graph(&state, &request)?;
    let sequence = state
        .sequences
        .create(request.name, request.nodes, request.edges)
        .await?;
    let scheduled = schedule_sequence_jobs(&state, &sequence).await?;
    info!(sequence_id = %sequence.id, scheduled, "sequence published");
    Ok((StatusCode::CREATED, Json(sequence)))
}

async fn update_sequence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SequenceRequest>,
) -> Result<Json<Sequence>, ApiError> {
    validate_graph(&state, &request)?;
    let sequence = state
        .sequences
        .update(&id, request.name, request.nodes, request.edges)
        .await?;

    // Clear the previous generation before rescheduling; not atomic.
    state
        .scheduler
        .cancel(&PayloadFilter::new().field_eq("sequenceId", id.as_str()))
        .await?;
    let scheduled = schedule_sequence_jobs(&state, &sequence).await?;
    info!(sequence_id = %sequence.id, scheduled, "sequence rescheduled");

    Ok(Json(sequence))
}

async fn delete_sequence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.sequences.delete(&id).await?;
    state
        .scheduler
        .cancel(&PayloadFilter::new().field_eq("sequenceId", id.as_str()))
        .await?;
    info!(sequence_id = %id, "sequence deleted");
    Ok(Json(json!({ "message": "Sequence deleted successfully" })))
}

/// Reject structurally invalid graphs before anything is persisted.
fn validate_graph(state: &AppState, request: &SequenceRequest) -> Result<(), ApiError> {
    let graph = SequenceGraph::new(request.nodes.clone(), request.edges.clone());
    compile(&graph, "", Utc::now(), &state.compile_options)?;
    Ok(())
}

/// Compile the sequence's graph and submit every resulting job.
async fn schedule_sequence_jobs(state: &AppState, sequence: &Sequence) -> Result<usize, ApiError> {
    let jobs = compile(
        &sequence.graph(),
        &sequence.id,
        Utc::now(),
        &state.compile_options,
    )?;
    let count = jobs.len();
    for job in jobs {
        state
            .scheduler
            .schedule(job.fire_at, &job.kind, to_payload_value(&job.payload)?)
            .await?;
    }
    Ok(count)
}

fn to_payload_value(payload: &SendPayload) -> Result<Value, ApiError> {
    serde_json::to_value(payload).map_err(|e| ApiError::Internal(e.to_string()))
}
