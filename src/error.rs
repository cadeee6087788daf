//! Errors raised while scanning repositories for pull requests.

use thiserror::Error;

/// Every failure is fatal to the scan; there are no retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    /// The caller's identity could not be resolved.
    #[error("failed to resolve caller identity: {message}")]
    Auth {
        /// Error detail from the identity service.
        message: String,
    },

    /// A listing, detail or other service call failed.
    #[error("{operation} failed: {message}")]
    Upstream {
        /// The call that failed, e.g. `ListRepositories`.
        operation: String,
        /// Error detail from the service.
        message: String,
    },
}

impl ScanError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn upstream(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
