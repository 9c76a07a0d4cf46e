use thiserror::Error;

/// Failures raised by a ledger backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed key: {0}")]
    MalformedKey(String),

    #[error("Invalid bookmark: {0}")]
    InvalidBookmark(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl RegistryError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Store(StoreError::from(err))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}
