use crate::api::errors::ApiError;
use crate::api::types::{
    ApiResponse, DirectoryUser, UserInvitation, UserPage, UserProfileUpdate,
    UserRegistrationRequest, decode_payload,
};
use crate::auth::SessionManager;
use crate::config::ApiConfig;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Authenticated HTTP client for the backend REST API.
///
/// Every outbound request runs a best-effort refresh check against the
/// attached [`SessionManager`] and carries the current access token as a
/// bearer credential. The token lives in a single slot read at request
/// time; there is no cached default header to drift out of sync. All
/// failures are normalized into [`ApiError`] and surfaced through the
/// [`ApiResponse`] envelope, never as a panic.
///
/// # Examples
///
/// ```no_run
/// use client::api::ApiClient;
/// use client::config::ApiConfig;
///
/// let api = ApiClient::new(&ApiConfig::default());
/// api.attach_session_manager(manager);
///
/// let users = api.get_all_users(0, 20).await;
/// if let Some(error) = users.error {
///     eprintln!("listing users failed: {error}");
/// }
/// ```
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    token: RwLock<Option<String>>,
    manager: RwLock<Option<Arc<SessionManager>>>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            token: RwLock::new(None),
            manager: RwLock::new(None),
        }
    }

    /// Attaches the session manager consulted for pre-request refresh
    /// checks.
    pub fn attach_session_manager(&self, manager: Arc<SessionManager>) {
        *self.manager.write().unwrap() = Some(manager);
    }

    /// Replaces the current bearer token.
    pub fn set_auth_token(&self, token: &str) {
        *self.token.write().unwrap() = Some(token.to_string());
        log::debug!("auth token set in api client");
    }

    /// Drops the current bearer token; subsequent requests go out
    /// unauthenticated.
    pub fn clear_auth_token(&self) {
        *self.token.write().unwrap() = None;
        log::debug!("auth token cleared from api client");
    }

    /// The token that would be attached to the next request.
    pub fn current_auth_token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }

    // Auth endpoints

    pub async fn register_user(&self, user_data: &UserRegistrationRequest) -> ApiResponse<Value> {
        self.envelope(
            Method::POST,
            "/auth/register",
            Some(serde_json::json!(user_data)),
            Some("Registration successful"),
        )
        .await
    }

    pub async fn validate_user(&self, username: &str) -> ApiResponse<Value> {
        self.envelope(
            Method::GET,
            &format!("/auth/validate/{username}"),
            None,
            None,
        )
        .await
    }

    // User endpoints

    pub async fn get_current_user(&self) -> ApiResponse<Value> {
        self.envelope(Method::GET, "/users/me", None, None).await
    }

    pub async fn update_user_profile(&self, user_data: &UserProfileUpdate) -> ApiResponse<Value> {
        self.envelope(
            Method::PUT,
            "/users/me",
            Some(serde_json::json!(user_data)),
            Some("Profile updated successfully"),
        )
        .await
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> ApiResponse<DirectoryUser> {
        self.envelope(Method::GET, &format!("/v1/users/{user_id}"), None, None)
            .await
    }

    pub async fn get_all_users(&self, page: u32, size: u32) -> ApiResponse<UserPage> {
        self.envelope(
            Method::GET,
            &format!("/v1/users?page={page}&size={size}"),
            None,
            None,
        )
        .await
    }

    pub async fn invite_user(&self, invitation: &UserInvitation) -> ApiResponse<Value> {
        self.envelope(
            Method::POST,
            "/v1/accounts/admin/invite",
            Some(serde_json::json!(invitation)),
            Some("User invited successfully"),
        )
        .await
    }

    pub async fn delete_account(&self, account_id: &str) -> ApiResponse<Value> {
        self.envelope(
            Method::DELETE,
            &format!("/v1/accounts/{account_id}"),
            None,
            None,
        )
        .await
    }

    // Generic HTTP methods

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResponse<T> {
        self.envelope(Method::GET, endpoint, None, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> ApiResponse<T> {
        self.envelope(Method::POST, endpoint, Some(body), None).await
    }

    pub async fn put<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> ApiResponse<T> {
        self.envelope(Method::PUT, endpoint, Some(body), None).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResponse<T> {
        self.envelope(Method::DELETE, endpoint, None, None).await
    }

    async fn envelope<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        success_message: Option<&str>,
    ) -> ApiResponse<T> {
        match self.execute(method, endpoint, body).await {
            Ok((status, payload)) => match decode_payload(payload) {
                Ok(data) => match success_message {
                    Some(message) => ApiResponse::success_with_message(data, status, message),
                    None => ApiResponse::success(data, status),
                },
                Err(e) => ApiResponse::failure(e),
            },
            Err(e) => ApiResponse::failure(e),
        }
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<(u16, Value), ApiError> {
        self.ensure_valid_token().await;

        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self
            .http
            .request(method, &url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = self.current_auth_token() {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            // Proactive refresh makes stale-token 401s rare; this usually
            // means the user must re-authenticate interactively.
            log::warn!("unauthorized request to {url} - token may be invalid or expired");
        }

        let text = response.text().await.unwrap_or_default();
        let payload: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), payload));
        }

        Ok((status.as_u16(), payload))
    }

    /// Refreshes the access token when it nears expiry, before a request
    /// goes out.
    ///
    /// Refresh failures are logged and the request proceeds with the
    /// existing token: a best-effort check must not turn into a hard
    /// failure for requests that might still succeed.
    async fn ensure_valid_token(&self) {
        let manager = self.manager.read().unwrap().clone();
        let Some(manager) = manager else {
            return;
        };

        let Some(current) = manager.access_token() else {
            log::warn!("no access token available for request");
            return;
        };

        if manager.token_expires_within(manager.refresh_policy().request_threshold) {
            log::info!("access token expiring soon, refreshing before request");
            match manager.refresh_token().await {
                Ok(token) => self.set_auth_token(&token),
                Err(e) => log::warn!("pre-request token refresh failed: {e}"),
            }
        } else {
            // Keep the slot in step with the provider's current token.
            *self.token.write().unwrap() = Some(current);
        }
    }
}
