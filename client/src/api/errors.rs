use serde_json::Value;
use thiserror::Error;

/// Normalized error shape for every API client failure.
///
/// Three origins map to three shapes: transport failures with no response
/// become [`ApiError::NETWORK_ERROR`] with status code 0; a server error
/// body contributes its own `code`/`message` with
/// [`ApiError::UNKNOWN_ERROR`] as fallback; anything else (request
/// construction, body decoding) is [`ApiError::UNKNOWN_ERROR`] with status
/// code 0.
#[derive(Debug, Clone, Error)]
#[error("{message} ({code}, HTTP {status_code})")]
pub struct ApiError {
    pub message: String,
    pub code: String,
    pub status_code: u16,
    pub details: Option<Value>,
}

impl ApiError {
    pub const NETWORK_ERROR: &'static str = "NETWORK_ERROR";
    pub const UNKNOWN_ERROR: &'static str = "UNKNOWN_ERROR";

    /// Error for a failure that never produced an HTTP response.
    pub fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_builder() {
            Self {
                message: error.to_string(),
                code: Self::UNKNOWN_ERROR.to_string(),
                status_code: 0,
                details: None,
            }
        } else {
            Self {
                message: "Network error - please check your connection".to_string(),
                code: Self::NETWORK_ERROR.to_string(),
                status_code: 0,
                details: None,
            }
        }
    }

    /// Error extracted from a non-success response body.
    pub fn from_response(status_code: u16, body: Value) -> Self {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("An error occurred")
            .to_string();
        let code = body
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or(Self::UNKNOWN_ERROR)
            .to_string();

        Self {
            message,
            code,
            status_code,
            details: Some(body),
        }
    }

    /// Error for a client-side failure after a successful response, e.g. a
    /// body that does not decode into the expected type.
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Self::UNKNOWN_ERROR.to_string(),
            status_code: 0,
            details: None,
        }
    }
}
