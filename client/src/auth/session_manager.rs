use crate::auth::errors::AuthError;
use crate::auth::listeners::{ListenerRegistry, Subscription};
use crate::auth::provider::{IdentityProvider, InitOptions};
use crate::auth::refresh::TokenRefreshService;
use crate::auth::types::{AuthToken, RefreshPolicy, Session, TokenClaims, User};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinHandle;

struct RefreshEntry {
    service: Arc<TokenRefreshService>,
    handle: JoinHandle<()>,
}

/// Authoritative wrapper around the external identity provider client.
///
/// Owns the session lifecycle: exactly-once provider initialization,
/// interactive login/logout/registration, token refresh, and broadcast of
/// auth-state and token-refresh events. The provider client remains the
/// source of truth for authenticated/unauthenticated once initialized;
/// sessions are rebuilt from provider state on every read and broadcast,
/// never mutated in place.
///
/// # Examples
///
/// ```no_run
/// use client::auth::{RefreshPolicy, SessionManager};
/// use std::sync::Arc;
///
/// let manager = Arc::new(SessionManager::new(provider, RefreshPolicy::default()));
///
/// let authenticated = manager.initialize().await?;
/// if !authenticated {
///     manager.login().await?;
/// }
/// ```
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    policy: RefreshPolicy,
    init: OnceCell<Result<bool, AuthError>>,
    auth_listeners: ListenerRegistry<Option<Session>>,
    token_listeners: ListenerRegistry<String>,
    refresh: RwLock<Option<RefreshEntry>>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, policy: RefreshPolicy) -> Self {
        Self {
            provider,
            policy,
            init: OnceCell::new(),
            auth_listeners: ListenerRegistry::new(),
            token_listeners: ListenerRegistry::new(),
            refresh: RwLock::new(None),
        }
    }

    /// Initializes the provider client, at most once per manager.
    ///
    /// The first call performs a non-interactive SSO check; concurrent
    /// callers await the same in-flight initialization, and once it has
    /// completed every later call returns the provider's current
    /// authenticated flag immediately. A provider failure still marks the
    /// manager initialized (callers are not stuck retrying a client that is
    /// documented as unsafe to initialize twice) and surfaces as
    /// [`AuthError::InitFailed`].
    pub async fn initialize(&self) -> Result<bool, AuthError> {
        if self.init.get().is_some() {
            return Ok(self.provider.authenticated());
        }

        self.init
            .get_or_init(|| self.perform_initialization())
            .await
            .clone()
    }

    async fn perform_initialization(&self) -> Result<bool, AuthError> {
        let authenticated = match self.provider.init(InitOptions::default()).await {
            Ok(authenticated) => authenticated,
            Err(e) => {
                log::error!("identity provider initialization failed: {e}");
                return Err(AuthError::InitFailed);
            }
        };

        let session = if authenticated {
            match self.build_session() {
                Ok(session) => Some(session),
                Err(e) => {
                    log::error!("authenticated provider returned no usable session: {e}");
                    return Err(AuthError::InitFailed);
                }
            }
        } else {
            None
        };

        if authenticated {
            self.start_refresh_service().await;
        }
        self.auth_listeners.notify(&session);

        Ok(authenticated)
    }

    /// Runs the provider's interactive login flow and broadcasts the new
    /// session.
    ///
    /// Initializes first when needed. Every failure collapses to
    /// [`AuthError::LoginFailed`]: at this layer a user-cancelled redirect
    /// is indistinguishable from a network failure.
    pub async fn login(&self) -> Result<Session, AuthError> {
        if self.init.get().is_none() {
            self.initialize().await.map_err(|_| AuthError::LoginFailed)?;
        }

        self.provider.login().await.map_err(|e| {
            log::error!("interactive login failed: {e}");
            AuthError::LoginFailed
        })?;

        let session = self.build_session().map_err(|_| AuthError::LoginFailed)?;
        self.start_refresh_service().await;
        self.auth_listeners.notify(&Some(session.clone()));

        Ok(session)
    }

    /// Ends the provider session and unconditionally broadcasts a null
    /// session.
    ///
    /// A failed provider logout is logged and otherwise ignored: logout
    /// must never leave the application stuck authenticated.
    pub async fn logout(&self) {
        self.stop_refresh_service().await;

        if let Err(e) = self.provider.logout().await {
            log::error!("provider logout failed: {e}");
        }

        self.auth_listeners.notify(&None);
    }

    /// Runs the provider's interactive registration flow.
    ///
    /// Registration does not imply login; the session is left untouched.
    pub async fn register(&self) -> Result<(), AuthError> {
        self.provider.register().await.map_err(|e| {
            log::error!("provider registration failed: {e}");
            AuthError::RegistrationFailed
        })
    }

    /// Refreshes the access token if it expires within the interactive
    /// threshold.
    ///
    /// When the provider reports a refresh occurred the new token is
    /// broadcast to token-refresh listeners; otherwise the current token is
    /// returned unchanged. Fails with [`AuthError::TokenRefreshFailed`]
    /// when the provider has no token at all.
    pub async fn refresh_token(&self) -> Result<String, AuthError> {
        let refreshed = self
            .provider
            .update_token(self.policy.interactive_threshold)
            .await
            .map_err(|e| {
                log::error!("token refresh failed: {e}");
                AuthError::TokenRefreshFailed
            })?;

        if refreshed {
            if let Some(token) = self.provider.token() {
                self.token_listeners.notify(&token);
                return Ok(token);
            }
        }

        self.provider.token().ok_or(AuthError::TokenRefreshFailed)
    }

    /// The current session, rebuilt from provider state.
    pub fn current_session(&self) -> Option<Session> {
        if !self.is_authenticated() {
            return None;
        }
        self.build_session().ok()
    }

    /// Whether an initialized, authenticated provider session exists.
    pub fn is_authenticated(&self) -> bool {
        self.init.get().is_some() && self.provider.authenticated()
    }

    /// The current user projection, or `None` when unauthenticated.
    pub fn current_user(&self) -> Option<User> {
        if !self.is_authenticated() {
            return None;
        }
        self.provider
            .token_parsed()
            .map(|claims| User::from_claims(&claims))
    }

    /// The current user's subject identifier.
    pub fn current_user_id(&self) -> Option<String> {
        if !self.is_authenticated() {
            return None;
        }
        self.provider.token_parsed().and_then(|claims| claims.sub)
    }

    /// The current raw access token.
    pub fn access_token(&self) -> Option<String> {
        self.provider.token()
    }

    /// Whether the current token expires within `window`.
    ///
    /// Derived from the token's own `exp` claim; an absent or claim-less
    /// token reports `false` so a best-effort refresh check does not spin
    /// on tokens it cannot reason about.
    pub fn token_expires_within(&self, window: Duration) -> bool {
        let Some(exp) = self.provider.token_parsed().and_then(|claims| claims.exp) else {
            return false;
        };
        let Some(expires_at) = DateTime::from_timestamp(exp, 0) else {
            return false;
        };
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        expires_at - Utc::now() < window
    }

    /// Registers a listener for auth-state changes. `None` means the
    /// session ended.
    pub fn on_auth_state_changed(
        &self,
        listener: impl Fn(&Option<Session>) + Send + Sync + 'static,
    ) -> Subscription {
        self.auth_listeners.subscribe(listener)
    }

    /// Registers a listener for refreshed access tokens.
    pub fn on_token_refresh(
        &self,
        listener: impl Fn(&String) + Send + Sync + 'static,
    ) -> Subscription {
        self.token_listeners.subscribe(listener)
    }

    /// The refresh thresholds this manager was built with.
    pub fn refresh_policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    fn build_session(&self) -> Result<Session, AuthError> {
        let claims = self.provider.token_parsed().ok_or(AuthError::NoUserData)?;
        let user = User::from_claims(&claims);
        let token = self.build_token(&claims);
        let now = Utc::now();

        Ok(Session {
            user,
            token,
            is_authenticated: true,
            session_id: self.provider.session_id().unwrap_or_default(),
            created_at: now,
            last_activity: now,
        })
    }

    fn build_token(&self, claims: &TokenClaims) -> AuthToken {
        AuthToken {
            access_token: self.provider.token().unwrap_or_default(),
            refresh_token: self.provider.refresh_token(),
            expires_at: claims
                .exp
                .and_then(|exp| DateTime::from_timestamp(exp, 0))
                .unwrap_or(DateTime::UNIX_EPOCH),
            token_type: "Bearer".to_string(),
        }
    }

    async fn start_refresh_service(&self) {
        self.stop_refresh_service().await;

        let service = Arc::new(TokenRefreshService::new(
            Arc::clone(&self.provider),
            self.token_listeners.clone(),
            self.policy.clone(),
        ));
        let handle = Arc::clone(&service).start();

        *self.refresh.write().await = Some(RefreshEntry { service, handle });
        log::info!("token refresh service started");
    }

    async fn stop_refresh_service(&self) {
        if let Some(entry) = self.refresh.write().await.take() {
            entry.service.shutdown().await;
            entry.handle.abort();
            log::info!("token refresh service stopped");
        }
    }
}
