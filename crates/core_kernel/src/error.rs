//! Kernel error type

use thiserror::Error;

use crate::money::MoneyError;

/// Errors raised by kernel types outside the money arithmetic
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// A prefixed or bare UUID string that does not name an identifier
    #[error("Invalid {kind} identifier: {value}")]
    InvalidIdentifier { kind: &'static str, value: String },

    /// Rejected startup configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn invalid_identifier(kind: &'static str, value: impl Into<String>) -> Self {
        CoreError::InvalidIdentifier {
            kind,
            value: value.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        CoreError::Configuration(message.into())
    }
}
