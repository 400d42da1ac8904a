use crate::api::errors::ApiError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Uniform response envelope for every API client operation.
///
/// Expected failures land in `error` rather than a Rust error: callers
/// branch on [`ApiResponse::is_error`] (or the `error` field) instead of
/// matching on a `Result`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: Option<String>,
    pub status_code: Option<u16>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, status_code: u16) -> Self {
        Self {
            data: Some(data),
            error: None,
            message: None,
            status_code: Some(status_code),
        }
    }

    pub fn success_with_message(data: T, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data, status_code)
        }
    }

    pub fn failure(error: ApiError) -> Self {
        Self {
            data: None,
            error: Some(error.message),
            message: None,
            status_code: Some(error.status_code),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Registration payload for `POST /auth/register`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistrationRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub organization: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_by: Option<String>,
}

/// Invitation payload for `POST /v1/accounts/admin/invite`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInvitation {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Profile payload for `PUT /users/me`. Only the provided fields are sent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A user record as returned by the directory endpoints.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectoryUser {
    pub id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization_id: Option<String>,
    pub organization_name: Option<String>,
    pub role: Option<String>,
}

/// One page of the user directory (`GET /v1/users?page=&size=`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPage {
    pub content: Vec<DirectoryUser>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub number: u32,
    pub size: u32,
}

/// Decodes a successful response payload, normalizing decode failures.
pub(crate) fn decode_payload<T: DeserializeOwned>(
    payload: serde_json::Value,
) -> Result<T, ApiError> {
    serde_json::from_value(payload)
        .map_err(|e| ApiError::decode(format!("Failed to decode response body: {e}")))
}
