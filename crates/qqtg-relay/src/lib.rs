//! The relay engine: content conversion, topic registry, credential pool and
//! the forward/reverse orchestrators that tie them to the correlation store.

pub mod bridge;
pub mod convert;
pub mod error;
pub mod faces;
pub mod identicon;
pub mod metadata;
pub mod pool;
pub mod registry;
pub mod reverse;

pub use bridge::{Bridge, RelayOptions};
pub use convert::{convert, escape_html, ConversionError, ConvertOptions};
pub use error::RelayError;
pub use metadata::GroupDirectory;
pub use pool::CredentialPool;
pub use registry::TopicRegistry;
pub use reverse::convert_reverse;
