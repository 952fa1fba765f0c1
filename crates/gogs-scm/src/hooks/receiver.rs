//! HTTP endpoint receiving Gogs webhooks.
//!
//! The endpoint is unauthenticated: the Gogs server has no session to
//! present, so every event is dispatched with system-level visibility.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{HookEventType, EVENT_HEADER, FULL_PATH, LEGACY_EVENT_HEADER};
use crate::host::SourceOwners;

/// Rejections reported to the webhook sender.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReceiverError {
    #[error("X-Gogs-Event HTTP header not found")]
    MissingEventHeader,

    #[error("X-Gogs-Event HTTP header invalid: {0}")]
    UnknownEvent(String),
}

impl IntoResponse for ReceiverError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Dispatches webhook payloads to the sources they concern.
#[derive(Clone)]
pub struct HookReceiver {
    owners: Arc<dyn SourceOwners>,
}

impl HookReceiver {
    #[must_use]
    pub fn new(owners: Arc<dyn SourceOwners>) -> Self {
        Self { owners }
    }

    /// Dispatch one event.
    ///
    /// A malformed payload is logged by the parser and is not an error.
    pub fn notify(&self, event_key: Option<&str>, payload: &str) -> Result<(), ReceiverError> {
        let event_key = event_key.ok_or(ReceiverError::MissingEventHeader)?;
        let Some(event) = HookEventType::from_key(event_key) else {
            info!(event = %event_key, "Received unknown Gogs hook, skipping");
            return Err(ReceiverError::UnknownEvent(event_key.to_string()));
        };
        (event.processor())(self.owners.as_ref(), payload);
        Ok(())
    }
}

/// Event type from the request headers, preferring [`EVENT_HEADER`].
fn event_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(EVENT_HEADER)
        .or_else(|| headers.get(LEGACY_EVENT_HEADER))
        .and_then(|v| v.to_str().ok())
}

async fn notify_handler(
    State(receiver): State<HookReceiver>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, ReceiverError> {
    let payload = String::from_utf8_lossy(&body);
    receiver.notify(event_key(&headers), &payload)?;
    Ok("ok")
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Router serving the receiver at `/gogs-scmsource-hook/notify` plus `/health`.
pub fn build_router(receiver: HookReceiver) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(&format!("/{FULL_PATH}"), post(notify_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(receiver)
}
