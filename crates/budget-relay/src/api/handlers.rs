//! API handlers for the HTTP push endpoint

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::alerting::BudgetAlertRelay;
use crate::config::WriteMode;
use crate::error::{Error, FaultKind};
use crate::models::PushEnvelope;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Relay handling every push
    pub relay: Arc<BudgetAlertRelay>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    /// Crate version
    pub version: String,
    /// Store backend name
    pub store: String,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store = state.relay.store();
    let (code, status) = match store.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!(backend = store.backend(), error = %e, "Store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: store.backend().to_string(),
        }),
    )
}

/// Handle one pushed envelope.
///
/// Soft outcomes and sends answer 200 with the outcome text; faults answer non-2xx so
/// the platform redelivers or dead-letters the message.
pub async fn receive_push(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, String), (StatusCode, String)> {
    let envelope = PushEnvelope::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Rejected malformed push body");
        (StatusCode::BAD_REQUEST, format!("Malformed envelope: {e}"))
    })?;

    let outcome = state
        .relay
        .handle(&envelope)
        .await
        .map_err(|e| (fault_status(&e), e.to_string()))?;

    Ok((StatusCode::OK, outcome.to_string()))
}

/// HTTP status reported for a fault
pub fn fault_status(err: &Error) -> StatusCode {
    match err.kind() {
        FaultKind::Decode => StatusCode::BAD_REQUEST,
        FaultKind::Store => StatusCode::SERVICE_UNAVAILABLE,
        FaultKind::Notify => StatusCode::BAD_GATEWAY,
        FaultKind::Config | FaultKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Throttle status response
#[derive(Debug, Serialize)]
pub struct ThrottleStatusResponse {
    /// Time of the last recorded send
    pub last_sent: Option<DateTime<Utc>>,
    /// Earliest time the next alert may go out; `null` when nothing was sent
    /// or the instant is out of range
    pub next_eligible_at: Option<DateTime<Utc>>,
    /// Configured cooldown in hours
    pub min_interval_hours: f64,
    /// Store write mode
    pub write_mode: WriteMode,
    /// Store backend name
    pub backend: String,
}

/// Current throttle record and when the next alert may go out
pub async fn throttle_status(
    State(state): State<AppState>,
) -> Result<Json<ThrottleStatusResponse>, (StatusCode, String)> {
    let relay = &state.relay;
    let last_sent = relay
        .store()
        .get_last_sent()
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;

    Ok(Json(ThrottleStatusResponse {
        last_sent,
        next_eligible_at: last_sent.and_then(|at| relay.policy().next_eligible_at(at)),
        min_interval_hours: relay.policy().min_interval_hours(),
        write_mode: relay.write_mode(),
        backend: relay.store().backend().to_string(),
    }))
}
