//! Route handlers for the gateway endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use super::AppState;
use crate::admission::AdmissionBackend;

const API_MESSAGE: &str = "Football Manager API v1";
const API_VERSION: &str = "1.0.0";

/// Liveness probe.
pub async fn health<B: AdmissionBackend + 'static>(State(state): State<AppState<B>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": &*state.service_name,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub async fn api_v1() -> Json<Value> {
    Json(json!({
        "message": API_MESSAGE,
        "version": API_VERSION,
    }))
}

pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
