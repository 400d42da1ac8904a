pub mod context;

pub use context::{AuthState, SessionContext};
