//! Errors raised by store adapters.

/// Errors that can occur in a store adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A conditional write found a different version (or a failed guard).
    /// Nothing from the batch was applied.
    #[error("write conflict on {entity} {id}")]
    Conflict { entity: &'static str, id: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("corrupt record: {details}")]
    Corrupt { details: String },

    #[error("migration failed at version {version}: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl StoreError {
    pub fn conflict(entity: &'static str, id: impl ToString) -> Self {
        Self::Conflict {
            entity,
            id: id.to_string(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
