//! Conversions from third-party error types.

use super::types::GatewayError;

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return GatewayError::TimeoutError(format!("Request timed out: {e}"));
        }
        if e.is_connect() {
            return GatewayError::ProviderError(format!("Connection error: {e}"));
        }
        if e.is_decode() || e.is_body() {
            return GatewayError::StreamError(format!("Failed to read body: {e}"));
        }
        GatewayError::ProviderError(format!("Failed to send request: {e}"))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::ParseError(format!("JSON error: {e}"))
    }
}
