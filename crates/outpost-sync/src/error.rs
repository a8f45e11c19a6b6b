//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌──────────────────────┐  ┌───────────────────┐  │
//! │  │  Configuration  │  │   Remote (Gateway)   │  │      Local        │  │
//! │  │                 │  │                      │  │                   │  │
//! │  │  InvalidConfig  │  │  TransientNetwork ↻  │  │  NotReady         │  │
//! │  │  InvalidUrl     │  │  NotFound            │  │  Database         │  │
//! │  │  ConfigLoad/Save│  │  Validation          │  │  Validation       │  │
//! │  │                 │  │  ServerRejected      │  │  Offline ↻        │  │
//! │  └─────────────────┘  └──────────────────────┘  └───────────────────┘  │
//! │                                                                         │
//! │  ↻ = is_retryable()                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both enums are `Clone`: one gateway outcome is handed to every caller
//! that joined a collapsed request.

use thiserror::Error;

use outpost_core::{CoreError, ValidationError};

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// Gateway Error
// =============================================================================

/// A remote failure, classified at the gateway boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Connect failure, timeout, 5xx, 408 or 429. Worth retrying.
    #[error("Network unavailable: {0}")]
    TransientNetwork(String),

    /// The requested record does not exist. An expected business outcome.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server refused the input (400, 422). The caller must correct it.
    #[error("Rejected as invalid: {0}")]
    Validation(String),

    /// Any other refusal (stock conflict, auth, ...).
    #[error("Server rejected request ({status}): {message}")]
    ServerRejected { status: u16, message: String },
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::TransientNetwork(_))
    }
}

// =============================================================================
// Sync Error
// =============================================================================

/// Sync error type covering every failure the offline core reports.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// Classified gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The terminal knows it is offline, so the server was not asked.
    #[error("Terminal is offline")]
    Offline,

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// The local store failed to open. Offline features are unavailable.
    #[error("Local store is not ready")]
    NotReady,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Scheduler is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<outpost_db::DbError> for SyncError {
    fn from(err: outpost_db::DbError) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => SyncError::Validation(v),
            other => SyncError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the same call may succeed later without changes.
    ///
    /// A caller that gets `true` should keep the sale queued or show a
    /// "try again" message, never "create new product".
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Gateway(GatewayError::TransientNetwork(_)) | SyncError::Offline
        )
    }

    /// Returns true if the server (or both sources) reported the record absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Gateway(GatewayError::NotFound(_)))
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
