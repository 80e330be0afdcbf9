//! Webhook endpoint handler.
//!
//! Authenticates GitHub deliveries, decodes pull request events and waits for
//! the repository's worker to handle them. The response status tells GitHub
//! whether a redelivery could help.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::types::DeliveryId;
use crate::webhooks::{ParseError, parse_webhook, verify_signature};
use crate::worker::DispatchError;

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ParseError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            WebhookError::Dispatch(DispatchError::Engine(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::Dispatch(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, self.to_string()).into_response()
    }
}

/// `POST /webhooks`.
///
/// - 200: handled, ignored, or failed with the failure reported on the PR
/// - 400: missing header or malformed payload
/// - 401: signature mismatch
/// - 500: the failure could not be reported
/// - 503: shutting down
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let signature_header = get_header(&headers, HEADER_SIGNATURE)?;
    let delivery = get_header(&headers, HEADER_DELIVERY).ok().map(DeliveryId::new);

    debug!(
        delivery_id = delivery.as_ref().map(|d| d.as_str()),
        event_type = %event_type,
        "Received webhook"
    );

    // Verify before parsing anything.
    if !verify_signature(&body, &signature_header, app_state.webhook_secret()) {
        warn!(
            delivery_id = delivery.as_ref().map(|d| d.as_str()),
            "Invalid webhook signature"
        );
        return Err(WebhookError::InvalidSignature);
    }

    let Some(event) = parse_webhook(&event_type, &body)? else {
        debug!(event_type = %event_type, "Ignoring event");
        return Ok((StatusCode::OK, "ignored"));
    };

    info!(
        delivery_id = delivery.as_ref().map(|d| d.as_str()),
        repo = %event.repo,
        pr = %event.pr_number,
        action = event.action.as_str(),
        "Dispatching pull request event"
    );

    let outcome = app_state.dispatcher().dispatch(event, delivery).await?;
    Ok((StatusCode::OK, outcome.label()))
}

fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
