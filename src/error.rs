//! Errors raised while building filters and hash keys.

use thiserror::Error;

/// Errors that can occur while constructing a filter.
///
/// Membership operations never fail; only construction does.
#[derive(Debug, Error)]
pub enum Error {
    /// A construction parameter is outside of its valid domain.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The operating system's random source could not produce a hash key.
    #[error("secure random source unavailable: {0}")]
    RandomSource(#[from] rand::Error),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
