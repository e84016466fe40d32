pub mod adapter;
pub mod attach;
pub mod commands;
pub mod credential;
pub mod error;
pub mod handler;
pub mod send;

pub use adapter::TelegramAdapter;
pub use credential::TelegramCredential;
pub use error::TelegramError;
