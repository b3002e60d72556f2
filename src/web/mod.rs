//! # Notification Endpoint
//!
//! Axum router exposing `POST /notifications`. The disposition decides the status
//! code: 403 for signature failures, 400 for malformed bodies, 200 for everything
//! the connector accepted (including unknown handles and duplicates), 500 when an
//! internal store or sink failed.

use crate::orchestration::RemoteJobConnector;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

/// Header carrying the provider signature handed to the `NotificationVerifier`
pub const SIGNATURE_HEADER: &str = "x-tasker-signature";

pub fn notification_router(connector: Arc<RemoteJobConnector>) -> Router {
    Router::new()
        .route("/notifications", post(receive_notification))
        .with_state(connector)
}

async fn receive_notification(
    State(connector): State<Arc<RemoteJobConnector>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match connector.handle_notification(signature, &body).await {
        Ok(disposition) => {
            let status =
                StatusCode::from_u16(disposition.status_code()).unwrap_or(StatusCode::OK);
            let body = serde_json::to_value(&disposition)
                .unwrap_or_else(|_| json!({"disposition": "unknown"}));
            (status, Json(body))
        }
        Err(e) => {
            error!(error = %e, "Notification handling failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}
