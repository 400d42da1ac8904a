use crate::auth::errors::AuthorizationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// High-level authentication status visible to the application.
///
/// `Loading` is the only valid initial state. Transitions to
/// `Authenticated`/`Unauthenticated` happen as a consequence of session
/// manager events or initialization results; `Error` is reachable from any
/// state on an initialization, login, or registration failure and is left
/// only through a new login attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    #[default]
    Loading,
    Authenticated,
    Unauthenticated,
    Error,
}

/// Access credentials derived from the identity provider's token state.
///
/// Never persisted independently of a [`Session`]; `expires_at` always comes
/// from the token's own `exp` claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

impl AuthToken {
    /// Whether the token expires within the given window from now.
    ///
    /// Backs both the pre-request and the interactive refresh thresholds.
    pub fn expires_within(&self, window: Duration) -> bool {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        self.expires_at - Utc::now() < window
    }
}

/// An authenticated session.
///
/// Rebuilt from provider state on every login, refresh, and initialization;
/// never mutated in place. The absence of a session always means
/// unauthenticated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub token: AuthToken,
    pub is_authenticated: bool,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Realm-level role assignments inside the parsed token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims of the parsed access token, as exposed by the identity provider
/// client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Option<String>,
    pub preferred_username: Option<String>,
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub realm_access: Option<RealmAccess>,
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    pub organization: Option<String>,
    pub tenant_id: Option<String>,
    /// Expiry as seconds since the Unix epoch
    pub exp: Option<i64>,
    pub email_verified: Option<bool>,
}

/// Identity projection of the current user, derived from token claims.
///
/// Exists only for the lifetime of its session; never persisted by this
/// library.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub groups: Option<Vec<String>>,
    pub organization: Option<String>,
    pub tenant_id: Option<String>,
    pub is_active: bool,
    pub email_verified: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Builds the user projection from parsed token claims.
    pub fn from_claims(claims: &TokenClaims) -> Self {
        let now = Utc::now();
        Self {
            id: claims.sub.clone().unwrap_or_default(),
            username: claims.preferred_username.clone().unwrap_or_default(),
            email: claims.email.clone().unwrap_or_default(),
            first_name: claims.given_name.clone(),
            last_name: claims.family_name.clone(),
            name: claims.name.clone(),
            roles: claims
                .realm_access
                .as_ref()
                .map(|access| access.roles.clone())
                .unwrap_or_default(),
            groups: claims.groups.clone(),
            organization: claims.organization.clone(),
            tenant_id: claims.tenant_id.clone(),
            is_active: true,
            email_verified: claims.email_verified,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Checks for a role, returning an [`AuthorizationError`] naming the
    /// missing role when absent.
    pub fn require_role(&self, role: &str) -> Result<(), AuthorizationError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AuthorizationError::new(role))
        }
    }
}

/// Token refresh thresholds shared by every refresh call site.
///
/// The interactive threshold drives explicit refresh calls and the
/// background loop; the request threshold is the wider pre-request buffer so
/// request latency cannot race token expiry. Keeping both in one value
/// prevents the thresholds from drifting apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub interactive_threshold: Duration,
    pub request_threshold: Duration,
    /// Cadence of the background refresh loop. The loop is a safety net
    /// only; correctness must not depend on it firing at any particular
    /// cadence.
    pub background_interval: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interactive_threshold: Duration::from_secs(70),
            request_threshold: Duration::from_secs(300),
            background_interval: Duration::from_secs(60),
        }
    }
}
