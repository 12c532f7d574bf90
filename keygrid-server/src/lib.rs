//! HTTP API for the Keygrid license registry.
//!
//! Two endpoints, both requiring a bearer identity:
//! - `POST /api/license/activate` — bind this machine to a license key
//! - `POST /api/license/check` — ask whether this machine holds a valid license
//!
//! Expected negative outcomes (unknown key, wrong owner, expired, seat
//! limit) come back as HTTP 200 with `valid: false`; only missing identity
//! (401) and storage failures (500) use error status codes.

pub mod identity;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use keygrid_registry::{
    format_timestamp, DenialReason, LicenseKey, LicenseRegistry, LicenseStatus,
};
use keygrid_types::{MachineId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::identity::IdentityProvider;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: LicenseRegistry,
    pub identity: Arc<dyn IdentityProvider>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ActivateRequest {
    pub license_key: String,
    pub machine_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CheckRequest {
    pub machine_id: String,
}

/// Wire shape shared by both endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LicenseStatusResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<LicenseStatus> for LicenseStatusResponse {
    fn from(status: LicenseStatus) -> Self {
        match status {
            LicenseStatus::Valid {
                license_type,
                expires_at,
            } => Self {
                valid: true,
                license_type: Some(license_type.to_string()),
                expires_at: expires_at.map(format_timestamp),
                error: None,
            },
            LicenseStatus::Invalid { reason } => Self {
                valid: false,
                license_type: None,
                // An expired denial still reports when the license ended.
                expires_at: match &reason {
                    DenialReason::Expired { expires_at } => Some(format_timestamp(*expires_at)),
                    _ => None,
                },
                error: Some(reason.to_string()),
            },
        }
    }
}

/// Build the HTTP API router with the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/license/activate", post(activate_handler))
        .route("/api/license/check", post(check_handler))
        .with_state(state)
}

async fn activate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ActivateRequest>,
) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(user_id) => user_id,
        Err(rejection) => return rejection,
    };
    let key = LicenseKey::new(req.license_key);
    let machine_id = MachineId::new(req.machine_id);
    match state.registry.activate(&key, user_id, &machine_id) {
        Ok(status) => Json(LicenseStatusResponse::from(status)).into_response(),
        Err(e) => storage_failure(&e),
    }
}

async fn check_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CheckRequest>,
) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(user_id) => user_id,
        Err(rejection) => return rejection,
    };
    let machine_id = MachineId::new(req.machine_id);
    match state.registry.check(user_id, &machine_id) {
        Ok(status) => Json(LicenseStatusResponse::from(status)).into_response(),
        Err(e) => storage_failure(&e),
    }
}

/// Resolves the `Authorization: Bearer` header to a trusted user id.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserId, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let Some(token) = token else {
        return Err(unauthorized("Not authenticated"));
    };
    state
        .identity
        .authenticate(token)
        .ok_or_else(|| unauthorized("Invalid or expired token"))
}

fn unauthorized(detail: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": detail })),
    )
        .into_response()
}

fn storage_failure(e: &keygrid_registry::RegistryError) -> Response {
    error!("license registry failure: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "internal error" })),
    )
        .into_response()
}
