use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod handlers;

/// Build the management API router.
/// All routes are relative; the caller mounts this under `/api/v1`.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/approvals",
            get(handlers::list_approvals).post(handlers::create_approval),
        )
        .route(
            "/approvals/:id",
            get(handlers::poll_approval).delete(handlers::cancel_approval),
        )
        .route("/approvals/:id/response", post(handlers::submit_response))
        .route("/approvals/:id/wait", get(handlers::wait_for_approval))
        .route("/messages", post(handlers::enqueue_message))
        .route("/messages/flush", post(handlers::flush_messages))
        .layer(middleware::from_fn_with_state(state, api_key_auth))
        .layer(TraceLayer::new_for_http())
        .fallback(fallback_404)
}

/// Full application: health and metrics at the root, management API under
/// `/api/v1`. Every response carries an `x-request-id`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(render_metrics))
        .nest("/api/v1", api_router(state.clone()))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn render_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Middleware: when an API key is configured, require it in `X-Api-Key`
/// (or as a bearer token). Open when no key is configured.
async fn api_key_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.config.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided_key = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim())
        });

    match provided_key {
        Some(k) if k == expected => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("management API: invalid API key");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("management API: missing X-Api-Key header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
