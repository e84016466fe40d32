pub mod config;
pub mod error;
pub mod types;

pub use config::QqtgConfig;
pub use error::QqtgError;
pub use types::{ConversationId, CredentialId, DestMessageId, Peer, SourceMessageKey, ThreadId};
