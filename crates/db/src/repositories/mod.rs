use thiserror::Error;

use cadence_core::collaborators::CollaboratorError;

pub mod consent;
pub mod directory;
pub mod escalations;
pub mod memory;
pub mod sequences;

pub use consent::SqlConsentStore;
pub use directory::SqlContactDirectory;
pub use escalations::SqlEscalationDesk;
pub use memory::{
    InMemoryConsentStore, InMemoryContactDirectory, InMemoryEscalationDesk,
    InMemoryMessageDelivery, InMemorySequenceScheduler,
};
pub use sequences::SqlSequenceScheduler;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for CollaboratorError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => CollaboratorError::Store(error.to_string()),
            RepositoryError::Decode(message) => CollaboratorError::Decode(message),
        }
    }
}
