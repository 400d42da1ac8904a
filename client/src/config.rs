//! Configuration types for the client library.
//!
//! Every section is serde-deserializable so an application can load it from
//! whatever configuration source it uses; the `Default` impls carry the
//! development defaults of the Zylo backend.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration for the client library.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Identity provider connection settings
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Backend REST API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Chat transport settings
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Connection settings for the external identity provider.
///
/// These are handed to whatever [`crate::auth::IdentityProvider`]
/// implementation the application composes in; the library itself never
/// speaks the provider's wire protocol.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the identity provider
    pub url: String,
    /// Realm the application authenticates against
    pub realm: String,
    /// Client identifier registered with the provider
    pub client_id: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            realm: "zylo".to_string(),
            client_id: "zylo-client".to_string(),
        }
    }
}

/// Settings for the backend REST API client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL prefix for all API requests
    pub base_url: String,
    /// Per-request timeout
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081/api".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Settings for the WebSocket chat transport.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the messaging backend (ws:// or wss://)
    pub base_url: String,
    /// Delay between reconnection attempts
    #[serde(with = "duration_millis")]
    pub reconnect_interval: Duration,
    /// Upper bound on consecutive reconnection attempts
    pub max_reconnect_attempts: u32,
    /// Wall-clock bound on a single connection attempt
    #[serde(with = "duration_millis")]
    pub connect_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://localhost:8081".to_string(),
            reconnect_interval: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Durations are configured as integer milliseconds on the wire.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
