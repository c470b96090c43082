// src/errors.rs
//! Error taxonomy for the credential authority.
//!
//! Every failure that reaches a caller is an [`AuthorityError`] with a stable
//! [`kind`](AuthorityError::kind). Ledger failures have their own type
//! ([`crate::blockchain::ledger_adapter::LedgerError`]) because they are
//! recovered inside the fallback resolver and never surface on their own.

use crate::models::credential::TokenId;
use thiserror::Error;

/// Errors produced by the local SQLite persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("lock poisoned: {0}")]
    Poisoned(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Typed result of every authority operation.
#[derive(Debug, Error)]
pub enum AuthorityError {
    // Validation
    #[error("holder address is missing or malformed")]
    InvalidHolderAddress,

    #[error("student name cannot be empty")]
    EmptyStudentName,

    #[error("degree type cannot be empty")]
    EmptyDegreeType,

    #[error("university cannot be empty")]
    EmptyUniversity,

    #[error("token id must be a positive integer, got {0:?}")]
    InvalidTokenId(String),

    #[error("invalid ledger binding: {0}")]
    InvalidLedgerBinding(String),

    // Authorization
    #[error("{0} is not an authorized issuer")]
    NotAuthorizedIssuer(String),

    #[error("only the administrator may change issuer authorization")]
    Unauthorized,

    // State
    #[error("credential {0} does not exist")]
    CredentialNotFound(TokenId),

    #[error("credential {0} is already revoked")]
    AlreadyRevoked(TokenId),

    // Infrastructure
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl AuthorityError {
    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthorityError::InvalidHolderAddress => "InvalidHolderAddress",
            AuthorityError::EmptyStudentName => "EmptyStudentName",
            AuthorityError::EmptyDegreeType => "EmptyDegreeType",
            AuthorityError::EmptyUniversity => "EmptyUniversity",
            AuthorityError::InvalidTokenId(_) => "InvalidTokenId",
            AuthorityError::InvalidLedgerBinding(_) => "InvalidLedgerBinding",
            AuthorityError::NotAuthorizedIssuer(_) => "NotAuthorizedIssuer",
            AuthorityError::Unauthorized => "Unauthorized",
            AuthorityError::CredentialNotFound(_) => "CredentialNotFound",
            AuthorityError::AlreadyRevoked(_) => "AlreadyRevoked",
            AuthorityError::Storage(_) => "StorageFailure",
        }
    }

    /// Whether the caller can fix the request and try again.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AuthorityError::InvalidHolderAddress
                | AuthorityError::EmptyStudentName
                | AuthorityError::EmptyDegreeType
                | AuthorityError::EmptyUniversity
                | AuthorityError::InvalidTokenId(_)
                | AuthorityError::InvalidLedgerBinding(_)
        )
    }

    /// Message safe to show to an HTTP caller. Storage internals stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AuthorityError::Storage(_) => "the credential store could not complete the request".to_string(),
            other => other.to_string(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for AuthorityError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        AuthorityError::Storage(StorageError::Poisoned(e.to_string()))
    }
}

pub type AuthorityResult<T> = Result<T, AuthorityError>;
