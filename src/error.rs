use thiserror::Error;

/// Failures inside the persistence layer. These never cross the store's
/// public boundary; they exist so the fault can be logged with context
/// before it degrades to "absent".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLITE: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO_FAILURE: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a stored record could not be turned into a typed entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    Shape(String),
    #[error("invalid record: {0}")]
    Invalid(String),
}

impl From<serde_json::Error> for RecordError {
    fn from(value: serde_json::Error) -> Self {
        Self::Shape(value.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
