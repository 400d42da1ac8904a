use crate::auth::types::TokenClaims;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by an identity provider client.
///
/// The provider's protocol is not this library's concern, so its errors are
/// carried opaquely and mapped to [`crate::auth::AuthError`] codes at the
/// session manager boundary.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Options for the provider's one-time initialization.
#[derive(Clone, Copy, Debug)]
pub struct InitOptions {
    /// Probe for an existing provider session without forcing an
    /// interactive redirect.
    pub check_sso: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self { check_sso: true }
    }
}

/// Contract of the external identity provider client.
///
/// Implementations wrap the provider's own SDK (login redirects, token
/// issuance, silent SSO). The session layer consumes only this surface and
/// treats the provider as the source of truth for the authenticated flag
/// and token state. `init` is documented as unsafe to call twice; the
/// [`crate::auth::SessionManager`] guarantees it runs at most once.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Performs the provider's one-time initialization and reports whether
    /// an existing session was found.
    async fn init(&self, options: InitOptions) -> Result<bool, ProviderError>;

    /// Starts the provider's interactive login flow.
    async fn login(&self) -> Result<(), ProviderError>;

    /// Ends the provider session.
    async fn logout(&self) -> Result<(), ProviderError>;

    /// Starts the provider's interactive registration flow. Registration
    /// does not imply login.
    async fn register(&self) -> Result<(), ProviderError>;

    /// Refreshes the access token if it expires within `min_validity`.
    /// Returns `true` when a refresh actually occurred.
    async fn update_token(&self, min_validity: Duration) -> Result<bool, ProviderError>;

    /// The current raw access token, if any.
    fn token(&self) -> Option<String>;

    /// The current refresh token, if any.
    fn refresh_token(&self) -> Option<String>;

    /// Claims of the current parsed access token, if any.
    fn token_parsed(&self) -> Option<TokenClaims>;

    /// Whether the provider currently holds an authenticated session.
    fn authenticated(&self) -> bool;

    /// Provider-side session identifier, if any.
    fn session_id(&self) -> Option<String>;
}
