//! # Error Types
//!
//! Domain-specific error types for outpost-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  outpost-core errors (this file)                                       │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  outpost-db errors                                                     │
//! │  └── DbError          - Local store failures                           │
//! │                                                                         │
//! │  outpost-sync errors                                                   │
//! │  ├── GatewayError     - Classified remote failures                     │
//! │  └── SyncError        - What the presentation layer sees               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError/SyncError → caller        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// A stored payload could not be decoded back into a record.
    ///
    /// ## When This Occurs
    /// - Queue row written by an older build with a different line item shape
    /// - Hand-edited database file
    #[error("Corrupt {entity} payload for {id}: {reason}")]
    CorruptPayload {
        entity: String,
        id: String,
        reason: String,
    },

    /// Cursor text could not be parsed as a timestamp.
    #[error("Invalid sync cursor '{0}'")]
    InvalidCursor(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before a sale is sent or queued, so the cashier can correct it
/// while the customer is still at the counter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Payment does not cover the sale.
    #[error("payment of {paid} cents does not cover total of {total} cents")]
    Underpaid { paid: i64, total: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "cashier_id".to_string(),
        };
        assert_eq!(err.to_string(), "cashier_id is required");

        let err = ValidationError::Underpaid {
            paid: 500,
            total: 650,
        };
        assert_eq!(
            err.to_string(),
            "payment of 500 cents does not cover total of 650 cents"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
