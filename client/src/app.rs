//! Application composition root.
//!
//! Construction is explicit and happens once at startup: the identity
//! provider implementation is injected, every consumer receives its
//! dependencies directly, and nothing lives in process-global state.

use crate::api::ApiClient;
use crate::auth::{IdentityProvider, RefreshPolicy, SessionManager};
use crate::chat::ChatSocket;
use crate::config::AppConfig;
use crate::session::SessionContext;
use std::sync::Arc;

/// The wired-up client application core.
///
/// # Examples
///
/// ```no_run
/// use client::app::AppContext;
/// use client::config::AppConfig;
///
/// // `provider` implements client::auth::IdentityProvider for the
/// // identity server named in config.identity.
/// let app = AppContext::build(AppConfig::default(), provider).await;
///
/// if !app.session.state().is_authenticated {
///     app.session.login().await;
/// }
/// ```
pub struct AppContext {
    pub config: AppConfig,
    pub auth: Arc<SessionManager>,
    pub api: Arc<ApiClient>,
    pub chat: ChatSocket,
    pub session: Arc<SessionContext>,
}

impl AppContext {
    /// Builds and starts the application core in dependency order.
    ///
    /// This runs the session manager's one-time initialization, so the
    /// returned context already reflects any existing provider session.
    pub async fn build(config: AppConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        let policy = RefreshPolicy::default();

        let auth = Arc::new(SessionManager::new(provider, policy));
        let api = Arc::new(ApiClient::new(&config.api));
        api.attach_session_manager(Arc::clone(&auth));

        let chat = ChatSocket::new(config.chat.clone());
        let session = SessionContext::start(Arc::clone(&auth), Arc::clone(&api)).await;

        Self {
            config,
            auth,
            api,
            chat,
            session,
        }
    }
}
