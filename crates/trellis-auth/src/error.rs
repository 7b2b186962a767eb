//! Error types for authentication.

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// A credential store needs at least one account.
    #[error("at least one account is required")]
    EmptyAccounts,

    /// An account has an empty user name or password.
    #[error("account #{index} has an empty user name or password")]
    EmptyField {
        /// Position of the offending account in the input list.
        index: usize,
    },

    /// An account string is not of the form `user:password`.
    #[error("malformed account, expected user:password")]
    MalformedAccount,

    /// The presented credentials do not match any account.
    #[error("invalid credentials")]
    Unauthorized,
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
