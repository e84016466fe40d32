//! QQ side of the relay, spoken through a OneBot v11 implementation.

pub mod client;
pub mod error;
pub mod event;
pub mod segment;

pub use client::OneBotClient;
pub use error::OneBotError;
pub use event::parse_event;
