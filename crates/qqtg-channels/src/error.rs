use qqtg_core::types::DestMessageId;
use thiserror::Error;

/// Errors raised by a platform collaborator (Telegram bot, OneBot client).
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The platform API rejected or failed the request.
    #[error("Request failed: {0}")]
    Request(String),

    /// A file could not be fetched.
    #[error("Download failed: {0}")]
    Download(String),

    /// The file exceeds the configured size limit.
    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    /// The operation is not possible for this target (e.g. an id out of range).
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A multi-part send failed after some parts were already delivered.
    /// `sent` holds their ids in send order.
    #[error("{source} (after {} message(s) were delivered)", sent.len())]
    Partial {
        sent: Vec<DestMessageId>,
        source: Box<ChannelError>,
    },
}
