use async_trait::async_trait;
use chrono::Utc;
use client::auth::{
    AuthError, IdentityProvider, InitOptions, ListenerRegistry, ProviderError, RefreshPolicy,
    SessionManager, TokenClaims, TokenRefreshService,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

// Helper module for token refresh testing
mod token_refresh_helpers {
    use super::*;

    /// Provider whose `update_token` can be scripted to refresh, skip, or
    /// fail.
    pub struct MockProvider {
        pub update_calls: AtomicU32,
        pub will_refresh: bool,
        pub fail_update: bool,
        pub token: RwLock<String>,
        pub refreshed_token: String,
        pub claims: RwLock<Option<TokenClaims>>,
    }

    impl MockProvider {
        pub fn new(expires_in_secs: i64) -> Self {
            Self {
                update_calls: AtomicU32::new(0),
                will_refresh: false,
                fail_update: false,
                token: RwLock::new("current-token".to_string()),
                refreshed_token: "refreshed-token".to_string(),
                claims: RwLock::new(Some(claims_expiring_in(expires_in_secs))),
            }
        }
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
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_update {
                return Err(ProviderError::new("refresh endpoint unavailable"));
            }
            if self.will_refresh {
                *self.token.write().unwrap() = self.refreshed_token.clone();
                *self.claims.write().unwrap() = Some(claims_expiring_in(3600));
                return Ok(true);
            }
            Ok(false)
        }

        fn token(&self) -> Option<String> {
            Some(self.token.read().unwrap().clone())
        }

        fn refresh_token(&self) -> Option<String> {
            Some("refresh-grant".to_string())
        }

        fn token_parsed(&self) -> Option<TokenClaims> {
            self.claims.read().unwrap().clone()
        }

        fn authenticated(&self) -> bool {
            true
        }

        fn session_id(&self) -> Option<String> {
            None
        }
    }

    pub fn claims_expiring_in(secs: i64) -> TokenClaims {
        TokenClaims {
            sub: Some("user-1".to_string()),
            exp: Some(Utc::now().timestamp() + secs),
            ..TokenClaims::default()
        }
    }

    pub fn short_policy() -> RefreshPolicy {
        RefreshPolicy {
            background_interval: Duration::from_millis(25),
            ..RefreshPolicy::default()
        }
    }
}

use token_refresh_helpers::*;

mod interactive_refresh {
    use super::*;

    #[tokio::test]
    async fn refreshed_token_is_returned_and_broadcast() {
        let provider = Arc::new(MockProvider {
            will_refresh: true,
            ..MockProvider::new(30)
        });
        let manager = SessionManager::new(
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
            RefreshPolicy::default(),
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = manager.on_token_refresh(move |token| {
            seen_clone.lock().unwrap().push(token.clone());
        });

        let token = manager.refresh_token().await.expect("refresh succeeded");
        assert_eq!(token, "refreshed-token");
        assert_eq!(*seen.lock().unwrap(), vec!["refreshed-token".to_string()]);
        assert_eq!(provider.update_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unneeded_refresh_returns_the_current_token_silently() {
        // Token still valid for 10 minutes: provider reports no refresh
        let provider = Arc::new(MockProvider::new(600));
        let manager = SessionManager::new(
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
            RefreshPolicy::default(),
        );

        let broadcasts = Arc::new(AtomicU32::new(0));
        let broadcasts_clone = Arc::clone(&broadcasts);
        let _sub = manager.on_token_refresh(move |_| {
            broadcasts_clone.fetch_add(1, Ordering::SeqCst);
        });

        let token = manager.refresh_token().await.expect("refresh succeeded");
        assert_eq!(token, "current-token");
        assert_eq!(broadcasts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failure_maps_to_token_refresh_failed() {
        let provider = Arc::new(MockProvider {
            fail_update: true,
            ..MockProvider::new(30)
        });
        let manager =
            SessionManager::new(provider as Arc<dyn IdentityProvider>, RefreshPolicy::default());

        let err = manager.refresh_token().await.unwrap_err();
        assert_eq!(err, AuthError::TokenRefreshFailed);
        assert_eq!(err.code(), "TOKEN_REFRESH_FAILED");
    }
}

mod expiry_window {
    use super::*;

    #[tokio::test]
    async fn pre_request_threshold_boundary() {
        // 4m59s until expiry: inside the 5 minute pre-request window
        let provider = Arc::new(MockProvider::new(299));
        let manager =
            SessionManager::new(provider as Arc<dyn IdentityProvider>, RefreshPolicy::default());
        let window = manager.refresh_policy().request_threshold;
        assert!(manager.token_expires_within(window));

        // 5m01s until expiry: outside it
        let provider = Arc::new(MockProvider::new(301));
        let manager =
            SessionManager::new(provider as Arc<dyn IdentityProvider>, RefreshPolicy::default());
        let window = manager.refresh_policy().request_threshold;
        assert!(!manager.token_expires_within(window));
    }
}

mod background_service {
    use super::*;

    #[tokio::test]
    async fn background_loop_broadcasts_refreshed_tokens() {
        let provider = Arc::new(MockProvider {
            will_refresh: true,
            ..MockProvider::new(60)
        });
        let listeners = ListenerRegistry::new();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = listeners.subscribe(move |token: &String| {
            seen_clone.lock().unwrap().push(token.clone());
        });

        let service = Arc::new(TokenRefreshService::new(
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
            listeners,
            short_policy(),
        ));
        let handle = Arc::clone(&service).start();

        tokio::time::sleep(Duration::from_millis(150)).await;
        service.shutdown().await;
        handle.abort();

        assert!(provider.update_calls.load(Ordering::SeqCst) >= 1);
        assert!(!seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn background_failures_only_hit_the_callback() {
        let provider = Arc::new(MockProvider {
            fail_update: true,
            ..MockProvider::new(60)
        });
        let failures = Arc::new(Mutex::new(Vec::new()));
        let failures_clone = Arc::clone(&failures);

        let service = Arc::new(
            TokenRefreshService::new(
                provider as Arc<dyn IdentityProvider>,
                ListenerRegistry::new(),
                short_policy(),
            )
            .with_failure_callback(Arc::new(move |error| {
                failures_clone.lock().unwrap().push(error.code());
            })),
        );
        let handle = Arc::clone(&service).start();

        tokio::time::sleep(Duration::from_millis(150)).await;

        // The loop survives repeated failures
        assert!(!handle.is_finished());
        let failures = failures.lock().unwrap();
        assert!(!failures.is_empty());
        assert!(failures.iter().all(|code| *code == "TOKEN_REFRESH_FAILED"));
        drop(failures);

        service.shutdown().await;
        handle.abort();
    }

    #[tokio::test]
    async fn shutdown_stops_further_refresh_checks() {
        let provider = Arc::new(MockProvider {
            will_refresh: true,
            ..MockProvider::new(60)
        });
        let service = Arc::new(TokenRefreshService::new(
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
            ListenerRegistry::new(),
            short_policy(),
        ));
        let handle = Arc::clone(&service).start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        service.shutdown().await;
        handle.abort();

        let calls_at_shutdown = provider.update_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(provider.update_calls.load(Ordering::SeqCst), calls_at_shutdown);
    }
}
