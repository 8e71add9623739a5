//! Liveness and readiness probes

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

use core_kernel::HealthCheckable;

use crate::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Present on readiness responses only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreProbe>,
}

#[derive(Serialize)]
pub struct StoreProbe {
    pub adapter: String,
    pub latency_ms: u64,
}

/// The process is up; touches nothing else
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: VERSION,
        store: None,
    })
}

/// Ready once the ledger store answers
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let probe = state.service.store().health_check().await;
    if !probe.is_healthy() {
        warn!(
            adapter = %probe.adapter_id,
            latency_ms = probe.latency_ms,
            message = ?probe.message,
            "Ledger store not ready"
        );
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(HealthResponse {
        status: "ready",
        version: VERSION,
        store: Some(StoreProbe {
            adapter: probe.adapter_id,
            latency_ms: probe.latency_ms,
        }),
    }))
}
