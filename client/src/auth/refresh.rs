use crate::auth::errors::AuthError;
use crate::auth::listeners::ListenerRegistry;
use crate::auth::provider::IdentityProvider;
use crate::auth::types::RefreshPolicy;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::interval;

/// Callback invoked when a background refresh attempt fails.
pub type RefreshFailureCallback = Arc<dyn Fn(&AuthError) + Send + Sync>;

/// Background service that periodically refreshes the access token before
/// it expires.
///
/// This loop is a best-effort safety net: failures are logged (and reported
/// to the optional failure callback) but never propagated, and correctness
/// of the session layer must not depend on it firing at any particular
/// cadence. The pre-request check in the API client is the primary refresh
/// path.
pub struct TokenRefreshService {
    provider: Arc<dyn IdentityProvider>,
    token_listeners: ListenerRegistry<String>,
    policy: RefreshPolicy,
    shutdown_signal: Arc<RwLock<bool>>,
    failure_callback: Option<RefreshFailureCallback>,
}

impl TokenRefreshService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        token_listeners: ListenerRegistry<String>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            provider,
            token_listeners,
            policy,
            shutdown_signal: Arc::new(RwLock::new(false)),
            failure_callback: None,
        }
    }

    /// Sets a callback to be invoked when a refresh attempt fails.
    pub fn with_failure_callback(mut self, callback: RefreshFailureCallback) -> Self {
        self.failure_callback = Some(callback);
        self
    }

    /// Starts the background refresh loop.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Signals the service to shut down.
    pub async fn shutdown(&self) {
        let mut shutdown = self.shutdown_signal.write().await;
        *shutdown = true;
    }

    async fn run(&self) {
        let mut check_interval = interval(self.policy.background_interval);
        check_interval.tick().await; // Skip the first immediate tick

        loop {
            if *self.shutdown_signal.read().await {
                log::info!("token refresh service shutting down");
                break;
            }

            check_interval.tick().await;

            if let Err(e) = self.check_and_refresh().await {
                log::error!("background token refresh failed: {e}");
                if let Some(callback) = &self.failure_callback {
                    callback(&e);
                }
            }
        }
    }

    /// Asks the provider to refresh when the token nears expiry and
    /// broadcasts the new token to refresh listeners.
    async fn check_and_refresh(&self) -> Result<(), AuthError> {
        if !self.provider.authenticated() {
            return Ok(());
        }

        let refreshed = self
            .provider
            .update_token(self.policy.interactive_threshold)
            .await
            .map_err(|e| {
                log::warn!("provider token update failed: {e}");
                AuthError::TokenRefreshFailed
            })?;

        if refreshed {
            if let Some(token) = self.provider.token() {
                log::debug!("access token refreshed in background");
                self.token_listeners.notify(&token);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::{InitOptions, ProviderError};
    use crate::auth::types::TokenClaims;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    // Mock provider for testing
    struct MockProvider {
        refresh_count: Arc<AtomicU32>,
        should_fail: bool,
    }

    #[async_trait]
    impl IdentityProvider for MockProvider {
        async fn init(&self, _options: InitOptions) -> Result<bool, ProviderError> {
            Ok(true)
        }

        async fn login(&self) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn logout(&self) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn register(&self) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn update_token(&self, _min_validity: Duration) -> Result<bool, ProviderError> {
            self.refresh_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(ProviderError::new("mock refresh failure"))
            } else {
                Ok(true)
            }
        }

        fn token(&self) -> Option<String> {
            Some("refreshed-token".to_string())
        }

        fn refresh_token(&self) -> Option<String> {
            None
        }

        fn token_parsed(&self) -> Option<TokenClaims> {
            None
        }

        fn authenticated(&self) -> bool {
            true
        }

        fn session_id(&self) -> Option<String> {
            None
        }
    }

    fn short_policy() -> RefreshPolicy {
        RefreshPolicy {
            background_interval: Duration::from_millis(20),
            ..RefreshPolicy::default()
        }
    }

    #[tokio::test]
    async fn broadcasts_refreshed_tokens() {
        let provider = Arc::new(MockProvider {
            refresh_count: Arc::new(AtomicU32::new(0)),
            should_fail: false,
        });
        let listeners = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = listeners.subscribe(move |token: &String| {
            seen_clone.lock().unwrap().push(token.clone());
        });

        let service = Arc::new(TokenRefreshService::new(
            provider.clone(),
            listeners,
            short_policy(),
        ));
        let handle = Arc::clone(&service).start();

        tokio::time::sleep(Duration::from_millis(120)).await;
        service.shutdown().await;
        handle.abort();

        assert!(provider.refresh_count.load(Ordering::SeqCst) >= 1);
        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|t| t == "refreshed-token"));
    }

    #[tokio::test]
    async fn failures_are_swallowed_and_reported() {
        let provider = Arc::new(MockProvider {
            refresh_count: Arc::new(AtomicU32::new(0)),
            should_fail: true,
        });
        let failures = Arc::new(AtomicU32::new(0));
        let failures_clone = Arc::clone(&failures);

        let service = Arc::new(
            TokenRefreshService::new(provider.clone(), ListenerRegistry::new(), short_policy())
                .with_failure_callback(Arc::new(move |_| {
                    failures_clone.fetch_add(1, Ordering::SeqCst);
                })),
        );
        let handle = Arc::clone(&service).start();

        tokio::time::sleep(Duration::from_millis(120)).await;

        // Still running after repeated failures
        assert!(!handle.is_finished());
        assert!(failures.load(Ordering::SeqCst) >= 1);

        service.shutdown().await;
        handle.abort();
    }
}
