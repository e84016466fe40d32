use qqtg_channels::ChannelError;

/// Errors produced by the OneBot client and event parser.
#[derive(Debug, thiserror::Error)]
pub enum OneBotError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{action} failed (retcode {retcode}): {message}")]
    Api {
        action: String,
        retcode: i64,
        message: String,
    },

    #[error("unexpected response to {action}: {detail}")]
    Decode { action: String, detail: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

impl From<OneBotError> for ChannelError {
    fn from(e: OneBotError) -> Self {
        match e {
            OneBotError::Io(_) => ChannelError::Download(e.to_string()),
            other => ChannelError::Request(other.to_string()),
        }
    }
}
