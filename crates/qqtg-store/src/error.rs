use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An insert hit one of the uniqueness indexes.
    #[error("duplicate {table} row: {detail}")]
    Duplicate { table: &'static str, detail: String },

    /// A stored row no longer satisfies a domain invariant (e.g. a zero id).
    #[error("corrupt {table} row: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
