//! Error types for directory store operations.
//!
//! Only conditions that make an operation impossible to carry out surface as
//! `Err`. Ordinary business outcomes (not found, conflict, undecodable entry)
//! are reported through [`OperationResult`](crate::result::OperationResult)
//! instead.

pub use crate::auth::credential::CredentialError;
pub use crate::auth::token::TokenError;
pub use crate::directory::errors::{BindError, DirectoryError};
pub use crate::entity::codec::DecodeError;

/// Main error type for store and authenticator operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connecting or binding to the directory failed. Always fatal for the
    /// whole call, including every item of a batch.
    #[error("Directory service unavailable: {0}")]
    ServiceUnavailable(#[from] BindError),

    /// A directory operation failed in a way the caller cannot express as a
    /// result status.
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
}

impl StoreError {
    /// Whether this error came from the bind step.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
