//! Error types for signing and validation.
//!
//! A request that fails validation is not an error: it yields a
//! [`ValidationResult`](crate::validator::ValidationResult) carrying the failure
//! code. [`AuthError`] is reserved for faults that prevent an answer, such as an
//! unusable configuration or a failing key repository.

use std::io;

/// Errors that abort a signing or validation operation.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A caller-supplied argument is unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The signature data carries no key.
    #[error("no key available to compute the signature")]
    MissingKey,

    /// The configuration cannot drive the operation (for example the character
    /// encoding or the authorization scheme is unset).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The configured HMAC algorithm name is not recognized.
    #[error("unsupported HMAC algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The key repository failed to resolve a key.
    #[error("key repository error: {0}")]
    KeyRepository(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Reading the content stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AuthError {
    /// Whether the error stems from the configuration rather than the caller.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::UnsupportedAlgorithm(_))
    }
}

/// Convenience result type for signing and validation.
pub type AuthResult<T> = Result<T, AuthError>;
