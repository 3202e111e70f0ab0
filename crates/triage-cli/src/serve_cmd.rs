use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use triage_core::remote::{RemoteJobService, create_thread_and_run};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }

    pub fn bad_gateway(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: format!("failed to triage ticket: {err:#}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// State and wire types
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn RemoteJobService>,
    pub endpoint: String,
    pub triage_agent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub endpoint: String,
    pub triage_agent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TriageRequest {
    pub ticket: String,
}

#[derive(Debug, Serialize)]
pub struct TriageResponse {
    pub thread_id: String,
    pub run_id: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/triage", post(triage))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    if state.triage_agent_id.is_none() {
        tracing::warn!("TRIAGE_AGENT_ID is not set; POST /triage will fail until it is");
    }
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("triage serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("triage serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        endpoint: state.endpoint,
        triage_agent_id: state.triage_agent_id,
    })
}

async fn triage(
    State(state): State<AppState>,
    Json(request): Json<TriageRequest>,
) -> Result<Json<TriageResponse>, AppError> {
    let Some(agent_id) = state.triage_agent_id.as_deref() else {
        return Err(AppError::internal("No triage agent configured. Set TRIAGE_AGENT_ID."));
    };
    if request.ticket.trim().is_empty() {
        return Err(AppError::bad_request("ticket must not be empty"));
    }

    let (thread, run) = create_thread_and_run(state.service.as_ref(), agent_id, &request.ticket)
        .await
        .map_err(AppError::bad_gateway)?;

    tracing::info!(thread_id = %thread.id, run_id = %run.id, "ticket submitted");
    Ok(Json(TriageResponse {
        thread_id: thread.id,
        run_id: run.id,
    }))
}
