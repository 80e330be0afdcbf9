//! Health check endpoint for liveness probes.

use axum::Json;
use serde::Serialize;

/// Body shared by the health check and API error responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub success: bool,
    pub error_description: Option<String>,
}

impl StatusBody {
    pub fn ok() -> Self {
        StatusBody {
            success: true,
            error_description: None,
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        StatusBody {
            success: false,
            error_description: Some(description.into()),
        }
    }
}

/// Always answers 200 with `{"success": true, "errorDescription": null}`.
pub async fn health_handler() -> Json<StatusBody> {
    Json(StatusBody::ok())
}
