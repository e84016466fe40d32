use qqtg_channels::ChannelError;
use qqtg_core::types::DestMessageId;

/// Errors produced by the Telegram adapter.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("teloxide error: {0}")]
    Teloxide(#[from] teloxide::RequestError),

    #[error("download error: {0}")]
    Download(#[from] teloxide::DownloadError),

    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("{what} out of range: {id}")]
    OutOfRange { what: &'static str, id: i64 },

    #[error("no bot token configured")]
    NoToken,

    /// Some messages of a multi-part send went out before `source` failed.
    #[error("{source} (after {} message(s) were delivered)", sent.len())]
    Partial {
        sent: Vec<DestMessageId>,
        source: Box<TelegramError>,
    },
}

impl TelegramError {
    /// Attach the ids already delivered. A no-op when none were; nested
    /// partials are flattened so `sent` stays in send order.
    pub fn after(self, mut delivered: Vec<DestMessageId>) -> Self {
        if delivered.is_empty() {
            return self;
        }
        match self {
            TelegramError::Partial { sent, source } => {
                delivered.extend(sent);
                TelegramError::Partial {
                    sent: delivered,
                    source,
                }
            }
            other => TelegramError::Partial {
                sent: delivered,
                source: Box::new(other),
            },
        }
    }
}

impl From<TelegramError> for ChannelError {
    fn from(e: TelegramError) -> Self {
        match e {
            TelegramError::Download(e) => ChannelError::Download(e.to_string()),
            TelegramError::TooLarge { size, max } => ChannelError::TooLarge { size, max },
            TelegramError::OutOfRange { .. } => ChannelError::Unsupported(e.to_string()),
            TelegramError::Partial { sent, source } => ChannelError::Partial {
                sent,
                source: Box::new((*source).into()),
            },
            other => ChannelError::Request(other.to_string()),
        }
    }
}
