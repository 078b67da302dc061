//! HTTP mixer service.
//!
//! Exposes the commit-reveal ledger over HTTP: participants POST commits and
//! reveals, anyone GETs the published pulse once an epoch closes. Every
//! ledger refusal maps to a definite status code; late, duplicate, and
//! malformed messages get an error body, never a crash.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use tokio::sync::Mutex;

use chronopulse_protocol::{
    CommitRequest, EpochConfig, EpochId, LedgerError, MemoryBlobStore, MixerHub, Pulse,
    RevealRequest, WallClock,
};

/// Shared server state.
pub struct AppState {
    hub: Mutex<MixerHub>,
    blobs: MemoryBlobStore,
    clock: Arc<dyn WallClock>,
}

impl AppState {
    pub fn new(cfg: EpochConfig, clock: Arc<dyn WallClock>) -> Arc<Self> {
        Arc::new(Self {
            hub: Mutex::new(MixerHub::new(cfg)),
            blobs: MemoryBlobStore::new(),
            clock,
        })
    }

    /// The store reveals are resolved against. Out-of-band trace publication
    /// goes through this handle.
    pub fn blob_store(&self) -> MemoryBlobStore {
        self.blobs.clone()
    }
}

#[derive(Serialize)]
struct AckResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl AckResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            error: None,
        })
    }

    fn err(e: &LedgerError) -> Json<Self> {
        Json(Self {
            success: false,
            error: Some(e.to_string()),
        })
    }
}

#[derive(Serialize)]
struct PulseResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pulse: Option<Pulse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    honest_fraction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

fn ack_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::DuplicateCommit { .. }
        | LedgerError::DuplicateReveal { .. }
        | LedgerError::Rejected { .. } => StatusCode::CONFLICT,
        LedgerError::MissingCommit { .. }
        | LedgerError::MalformedHash(_)
        | LedgerError::UnknownEpoch { .. } => StatusCode::BAD_REQUEST,
        LedgerError::CommitWindowNotOpen { .. }
        | LedgerError::CommitWindowClosed { .. }
        | LedgerError::RevealWindowNotOpen { .. }
        | LedgerError::RevealWindowClosed { .. }
        | LedgerError::EpochClosed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::NotYetCloseable { .. } => StatusCode::TOO_EARLY,
    }
}

async fn handle_commit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommitRequest>,
) -> (StatusCode, Json<AckResponse>) {
    let now_ms = state.clock.now_ms();
    let mut hub = state.hub.lock().await;
    match hub.commit(&req, now_ms) {
        Ok(()) => (StatusCode::OK, AckResponse::ok()),
        Err(err) => {
            log::debug!("commit refused: {err}");
            (ack_status(&err), AckResponse::err(&err))
        }
    }
}

async fn handle_reveal(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RevealRequest>,
) -> (StatusCode, Json<AckResponse>) {
    let now_ms = state.clock.now_ms();
    let mut hub = state.hub.lock().await;
    match hub.reveal(&req, now_ms) {
        Ok(()) => (StatusCode::OK, AckResponse::ok()),
        Err(err) => {
            log::debug!("reveal refused: {err}");
            (ack_status(&err), AckResponse::err(&err))
        }
    }
}

async fn handle_pulse(
    State(state): State<Arc<AppState>>,
    Path(epoch): Path<u64>,
) -> (StatusCode, Json<PulseResponse>) {
    let now_ms = state.clock.now_ms();
    let mut hub = state.hub.lock().await;
    match hub.pulse(EpochId(epoch), now_ms, &state.blobs) {
        Ok(pulse) => (
            StatusCode::OK,
            Json(PulseResponse {
                success: true,
                pulse: Some(pulse),
                honest_fraction: None,
                error: None,
            }),
        ),
        Err(err) => {
            let status = match err {
                LedgerError::UnknownEpoch { .. } => StatusCode::NOT_FOUND,
                _ => ack_status(&err),
            };
            let honest_fraction = match err {
                LedgerError::Rejected {
                    honest_fraction, ..
                } => Some(honest_fraction),
                _ => None,
            };
            (
                status,
                Json(PulseResponse {
                    success: false,
                    pulse: None,
                    honest_fraction,
                    error: Some(err.to_string()),
                }),
            )
        }
    }
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: chronopulse_protocol::VERSION.to_string(),
    })
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let hub = state.hub.lock().await;
    let cfg = hub.config().clone();
    drop(hub);

    Json(serde_json::json!({
        "name": "Chronopulse Mixer",
        "version": chronopulse_protocol::VERSION,
        "epoch_ms": cfg.epoch_ms,
        "honest_threshold": cfg.honest_threshold,
        "endpoints": {
            "/": "This API index",
            "/commit": {
                "method": "POST",
                "description": "Submit a commitment before the epoch's commit deadline",
            },
            "/reveal": {
                "method": "POST",
                "description": "Reveal a committed trace during the reveal window",
            },
            "/pulse/{epoch}": "Fetch the published pulse for a closed epoch",
            "/health": "Health check",
        },
    }))
}

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/commit", post(handle_commit))
        .route("/reveal", post(handle_reveal))
        .route("/pulse/{epoch}", get(handle_pulse))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Run the HTTP mixer service. Returns once the listener fails or the
/// server stops serving.
pub async fn run_server(state: Arc<AppState>, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    log::info!("mixer listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}
