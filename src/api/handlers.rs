use std::sync::Arc;
use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::approval::{AdaptivePoller, WaitOutcome};
use crate::errors::CourierError;
use crate::models::approval::{ApprovalId, ApprovalOption, ApprovalResponse, ApprovalSnapshot, PollStatus};
use crate::models::message::{FlushReport, Priority};
use crate::AppState;

const DEFAULT_WAIT_SECS: u64 = 30;
const MAX_WAIT_SECS: u64 = 300;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct CreateApprovalRequest {
    pub question: String,
    pub options: Vec<ApprovalOption>,
    pub header: Option<String>,
    /// Falls back to the configured default.
    pub timeout_seconds: Option<u64>,
}

#[derive(Serialize)]
pub struct CreateApprovalResponse {
    pub id: ApprovalId,
}

#[derive(Deserialize)]
pub struct WaitParams {
    pub max_wait_secs: Option<u64>,
}

#[derive(Deserialize)]
pub struct EnqueueRequest {
    pub text: String,
    #[serde(default)]
    pub priority: Priority,
}

/// `:id` path segment parsed as an [`ApprovalId`].
///
/// Malformed ids are rejected with the usual JSON error body.
pub struct ApprovalPath(pub ApprovalId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ApprovalPath {
    type Rejection = CourierError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| CourierError::validation(e.body_text()))?;
        raw.parse::<ApprovalId>()
            .map(Self)
            .map_err(|_| CourierError::validation(format!("'{}' is not a valid approval id", raw)))
    }
}

// ── Approvals ────────────────────────────────────────────────

pub async fn create_approval(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateApprovalRequest>,
) -> Result<impl IntoResponse, CourierError> {
    let id = state.approvals.create_approval(
        &payload.question,
        payload.options,
        payload.header,
        payload.timeout_seconds.map(Duration::from_secs),
    )?;
    Ok((StatusCode::CREATED, Json(CreateApprovalResponse { id })))
}

pub async fn list_approvals(State(state): State<Arc<AppState>>) -> Json<Vec<ApprovalSnapshot>> {
    Json(state.approvals.list_pending())
}

/// Terminal results are handed out once; a second GET returns `not_found`.
pub async fn poll_approval(
    State(state): State<Arc<AppState>>,
    ApprovalPath(id): ApprovalPath,
) -> Json<PollStatus> {
    Json(state.approvals.poll_response(id))
}

pub async fn submit_response(
    State(state): State<Arc<AppState>>,
    ApprovalPath(id): ApprovalPath,
    Json(response): Json<ApprovalResponse>,
) -> Result<impl IntoResponse, CourierError> {
    state.approvals.submit_response(id, response)?;
    Ok(Json(json!({ "id": id, "status": "resolved" })))
}

/// Idempotent: cancelling an unknown or finished approval is also 204.
pub async fn cancel_approval(
    State(state): State<Arc<AppState>>,
    ApprovalPath(id): ApprovalPath,
) -> StatusCode {
    state.approvals.cancel(id);
    StatusCode::NO_CONTENT
}

/// Long-poll with adaptive backoff. 202 if still pending at the deadline.
pub async fn wait_for_approval(
    State(state): State<Arc<AppState>>,
    ApprovalPath(id): ApprovalPath,
    Query(params): Query<WaitParams>,
) -> impl IntoResponse {
    let max_wait = Duration::from_secs(
        params
            .max_wait_secs
            .unwrap_or(DEFAULT_WAIT_SECS)
            .min(MAX_WAIT_SECS),
    );
    let mut poller = AdaptivePoller::new(state.scheduler.clone());
    let deadline = state.scheduler.sleep(max_wait);

    match poller.wait(&state.approvals, id, deadline).await {
        WaitOutcome::Interrupted => (
            StatusCode::ACCEPTED,
            Json(json!({ "id": id, "outcome": "pending" })),
        ),
        outcome => (StatusCode::OK, Json(json!(outcome))),
    }
}

// ── Messages ─────────────────────────────────────────────────

pub async fn enqueue_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EnqueueRequest>,
) -> Result<impl IntoResponse, CourierError> {
    state.batcher.add(payload.text, payload.priority).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "queued": state.batcher.len() })),
    ))
}

pub async fn flush_messages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FlushReport>, CourierError> {
    Ok(Json(state.batcher.flush().await?))
}
