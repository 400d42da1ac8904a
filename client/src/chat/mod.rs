pub mod socket;
pub mod types;

pub use socket::{ChatError, ChatSocket};
pub use types::{ChatMessage, ConnectionState, MessageDraft, MessageKind};
