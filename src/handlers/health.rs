//! Health and service-banner endpoints.

use crate::services::health_service::InstitutionHealth;
use crate::state::AppState;
use axum::{Json, extract::State};
use serde::Serialize;
use std::collections::BTreeMap;

/// Health check response: gateway status plus per-institution reachability.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub gateway: String,
    pub institutions: BTreeMap<String, InstitutionHealth>,
}

/// Probe every configured institution and report reachability.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "gateway": "healthy",
///   "institutions": {
///     "BANK1": "connected",
///     "BANK2": "disconnected"
///   }
/// }
/// ```
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        gateway: "healthy".to_string(),
        institutions: state.health.check_all().await,
    })
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
    pub institutions: Vec<String>,
}

/// Service banner with the configured institutions.
pub async fn read_root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "Interbank Payment Gateway".to_string(),
        status: "running".to_string(),
        institutions: state
            .directory
            .institutions()
            .iter()
            .map(|institution| institution.id.clone())
            .collect(),
    })
}
