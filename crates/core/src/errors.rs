use thiserror::Error;

use crate::collaborators::CollaboratorError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown conversation state `{0}`")]
    UnknownConversationState(String),
    #[error("unknown objection category `{0}`")]
    UnknownObjectionCategory(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use crate::collaborators::CollaboratorError;
    use crate::errors::{ApplicationError, DomainError};

    #[test]
    fn domain_errors_lift_into_application_errors() {
        let error: ApplicationError =
            DomainError::UnknownConversationState("archived".to_string()).into();
        assert!(matches!(error, ApplicationError::Domain(_)));
        assert!(error.to_string().contains("archived"));
    }

    #[test]
    fn collaborator_errors_keep_their_message() {
        let error: ApplicationError =
            CollaboratorError::Store("database lock timeout".to_string()).into();
        assert!(error.to_string().contains("database lock timeout"));
    }
}
