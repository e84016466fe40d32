use qqtg_channels::ChannelError;
use qqtg_core::types::{CredentialId, DestMessageId};
use qqtg_store::StoreError;

/// Errors that abort one relay. Per-segment conversion failures never get here;
/// they are rendered inline instead.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Channel(#[from] ChannelError),

    /// `credential` delivered `sent` before the send failed.
    #[error("{source} (after {} message(s) were delivered via {credential})", sent.len())]
    Partial {
        credential: CredentialId,
        sent: Vec<DestMessageId>,
        source: ChannelError,
    },

    #[error("no Telegram credentials configured")]
    NoCredentials,

    #[error("invalid {what}: {id}")]
    InvalidId { what: &'static str, id: i64 },
}
