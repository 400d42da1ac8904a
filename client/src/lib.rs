//! # Zylo Client Library
//!
//! Core library for the Zylo team chat client. This library provides the
//! authenticated session lifecycle on top of an external identity provider,
//! an authenticated HTTP API client, and a real-time chat transport with
//! automatic reconnection.
//!
//! ## Modules
//!
//! - [`auth`] - Identity provider session management and token refresh
//! - [`api`] - Authenticated HTTP client for the backend REST API
//! - [`chat`] - WebSocket chat transport with bounded reconnection
//! - [`session`] - Application-visible session state bridge
//! - [`app`] - Application composition root
//! - [`config`] - Configuration types and defaults

pub mod api;
pub mod app;
pub mod auth;
pub mod chat;
pub mod config;
pub mod session;

pub use api::{ApiClient, ApiError, ApiResponse};
pub use app::AppContext;
pub use auth::{
    AuthError, AuthStatus, AuthToken, AuthorizationError, IdentityProvider, InitOptions,
    ProviderError, RefreshPolicy, Session, SessionManager, Subscription, TokenClaims,
    TokenRefreshService, User,
};
pub use chat::{ChatError, ChatMessage, ChatSocket, ConnectionState, MessageDraft, MessageKind};
pub use config::{ApiConfig, AppConfig, ChatConfig, IdentityConfig};
pub use session::{AuthState, SessionContext};
