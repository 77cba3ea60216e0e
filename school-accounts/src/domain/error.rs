use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("password must be at least {min} characters, got {actual}")]
    PasswordTooShort { min: usize, actual: usize },
    #[error("invalid role: {0:?}")]
    InvalidRole(String),
    #[error("invalid email: {0:?}")]
    InvalidEmail(String),
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("user already exists: {0}")]
    UserAlreadyExists(String),
    #[error("user not found: {0}")]
    UserNotFound(Uuid),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn is_validation(&self) -> bool {
        matches!(self, DomainError::Validation(_))
    }
}
