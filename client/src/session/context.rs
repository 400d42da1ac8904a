use crate::api::ApiClient;
use crate::auth::listeners::Subscription;
use crate::auth::{AuthStatus, SessionManager, User};
use std::sync::{Arc, RwLock};

/// Application-visible session state.
#[derive(Clone, Debug)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub status: AuthStatus,
    pub error: Option<String>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: true,
            status: AuthStatus::Loading,
            error: None,
        }
    }
}

/// Bridge between the session manager's events and application-readable
/// state.
///
/// The single place where auth events become [`AuthState`] and where the
/// API client's token is kept in sync. It subscribes to the manager for its
/// whole lifetime, and every event fully replaces the local user, status,
/// and token state: the manager is authoritative, the bridge never
/// diverges from it.
pub struct SessionContext {
    manager: Arc<SessionManager>,
    api: Arc<ApiClient>,
    state: Arc<RwLock<AuthState>>,
    _auth_subscription: Subscription,
}

impl SessionContext {
    /// Subscribes to the manager and runs the one-time initialization.
    pub async fn start(manager: Arc<SessionManager>, api: Arc<ApiClient>) -> Arc<Self> {
        let state = Arc::new(RwLock::new(AuthState::default()));

        let subscription = {
            let state = Arc::clone(&state);
            let api = Arc::clone(&api);
            manager.on_auth_state_changed(move |session| {
                let mut current = state.write().unwrap();
                match session {
                    Some(session) => {
                        current.user = Some(session.user.clone());
                        current.is_authenticated = session.is_authenticated;
                        current.status = AuthStatus::Authenticated;
                        current.error = None;
                        api.set_auth_token(&session.token.access_token);
                    }
                    None => {
                        current.user = None;
                        current.is_authenticated = false;
                        current.status = AuthStatus::Unauthenticated;
                        api.clear_auth_token();
                    }
                }
                current.is_loading = false;
            })
        };

        let context = Arc::new(Self {
            manager,
            api,
            state,
            _auth_subscription: subscription,
        });
        context.initialize().await;
        context
    }

    async fn initialize(&self) {
        self.update(|state| {
            state.is_loading = true;
            state.status = AuthStatus::Loading;
            state.error = None;
        });

        match self.manager.initialize().await {
            Ok(true) => {
                let user = self.manager.current_user();
                if let Some(token) = self.manager.access_token() {
                    self.api.set_auth_token(&token);
                }
                self.update(|state| {
                    state.user = user.clone();
                    state.is_authenticated = true;
                    state.status = AuthStatus::Authenticated;
                });
            }
            Ok(false) => {
                self.api.clear_auth_token();
                self.update(|state| {
                    state.user = None;
                    state.is_authenticated = false;
                    state.status = AuthStatus::Unauthenticated;
                });
            }
            Err(e) => {
                self.api.clear_auth_token();
                self.update(|state| {
                    state.user = None;
                    state.is_authenticated = false;
                    state.status = AuthStatus::Error;
                    state.error = Some(e.to_string());
                });
            }
        }

        self.update(|state| state.is_loading = false);
    }

    /// Runs the interactive login flow, updating loading/error state around
    /// it.
    pub async fn login(&self) {
        self.update(|state| {
            state.is_loading = true;
            state.error = None;
        });

        match self.manager.login().await {
            Ok(session) => self.update(|state| {
                state.user = Some(session.user.clone());
                state.is_authenticated = session.is_authenticated;
                state.status = AuthStatus::Authenticated;
            }),
            Err(e) => self.update(|state| {
                state.error = Some(e.to_string());
                state.status = AuthStatus::Error;
            }),
        }

        self.update(|state| state.is_loading = false);
    }

    /// Ends the session. Always leaves the state unauthenticated, matching
    /// the manager's fail-open logout.
    pub async fn logout(&self) {
        self.update(|state| {
            state.is_loading = true;
            state.error = None;
        });

        self.manager.logout().await;

        self.update(|state| {
            state.user = None;
            state.is_authenticated = false;
            state.status = AuthStatus::Unauthenticated;
            state.is_loading = false;
        });
    }

    /// Runs the interactive registration flow. Does not change the session.
    pub async fn register(&self) {
        self.update(|state| {
            state.is_loading = true;
            state.error = None;
        });

        if let Err(e) = self.manager.register().await {
            self.update(|state| {
                state.error = Some(e.to_string());
                state.status = AuthStatus::Error;
            });
        }

        self.update(|state| state.is_loading = false);
    }

    pub fn clear_error(&self) {
        self.update(|state| state.error = None);
    }

    /// Snapshot of the current session state.
    pub fn state(&self) -> AuthState {
        self.state.read().unwrap().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.read().unwrap().user.clone()
    }

    fn update(&self, apply: impl FnOnce(&mut AuthState)) {
        apply(&mut self.state.write().unwrap());
    }
}
