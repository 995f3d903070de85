//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and invalid state transitions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Entity type names are lowercase identifiers (e.g. `time_entry`)
    #[error("Invalid entity type: {0}")]
    InvalidEntityType(String),

    /// Device identifiers must be non-empty and free of whitespace
    #[error("Invalid device ID: {0}")]
    InvalidDeviceId(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Update and delete operations need the remote id in their payload
    #[error("Operation {0} has no remote id in its payload")]
    MissingRemoteId(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidEntityType("Time Entry".to_string());
        assert_eq!(err.to_string(), "Invalid entity type: Time Entry");

        let err = DomainError::InvalidState {
            from: "Committed".to_string(),
            to: "InFlight".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid state transition from Committed to InFlight"
        );
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidId("x".to_string());
        let err2 = DomainError::InvalidId("x".to_string());
        let err3 = DomainError::InvalidId("y".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
