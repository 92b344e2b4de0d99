//! JSON error responses for failures before streaming starts.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({
            "error": {
                "type": self.kind(),
                "message": self.user_message(),
            }
        });
        (status, Json(body)).into_response()
    }
}
