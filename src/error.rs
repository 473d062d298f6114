use thiserror::Error;

/// The crate's single error type (§7), generic over nothing: the concrete
/// backend's error is erased to a boxed `std::error::Error` at the
/// `ReadStorage`/`WriteStorage` trait seam (see `storage::StorageError`),
/// since the backend driver itself is out of scope (§1).
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("uniqueness violation: attribute {attribute:?} value {value} is already held by entity {entity}")]
    UniquenessViolation {
        attribute: String,
        value: String,
        entity: i64,
    },

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("backend error: {0}")]
    Backend(#[from] crate::storage::StorageError),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(message.into())
    }

    pub fn entity_not_found(message: impl Into<String>) -> Self {
        Error::EntityNotFound(message.into())
    }

    pub fn is_entity_not_found(&self) -> bool {
        matches!(self, Error::EntityNotFound(_))
    }
}
