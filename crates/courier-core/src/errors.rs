//! Error types for the Courier delivery pipeline
//!
//! This module contains all error types used throughout the send pipeline:
//! collaborator failures (network, upload), server rejections, and the main
//! CourierError type that unifies them.

// ----------------------------------------------------------------------------
// Collaborator Error Types
// ----------------------------------------------------------------------------

/// Failures surfaced by the packet layer
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String },
    #[error("send failed: {reason}")]
    SendFailed { reason: String },
}

/// Failures surfaced by the highway uploader
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload rejected: {reason}")]
    Rejected { reason: String },
    #[error("upload interrupted: {reason}")]
    Interrupted { reason: String },
}

// ----------------------------------------------------------------------------
// Pipeline Error Type
// ----------------------------------------------------------------------------

/// Error type covering every fatal outcome of a logical send
///
/// Correlation timeouts are deliberately absent: an unconfirmed group receipt
/// degrades the result instead of failing it.
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    /// Content exceeds a hard size limit and no further strategy remains
    #[error("message too large: {context}")]
    MessageTooLarge { context: String },

    /// The server refused the send for a non-size reason
    #[error("send rejected by server (code {code}): {reason}")]
    SendRejected { code: i32, reason: String },

    /// The requested operation is not defined for this destination kind
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: String },

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// A pipeline invariant was violated; this indicates a defect, not a
    /// condition callers can recover from
    #[error("internal invariant violated: {reason}")]
    Internal { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl CourierError {
    /// Create a message-too-large error with context identifying the content
    pub fn too_large<T: Into<String>>(context: T) -> Self {
        CourierError::MessageTooLarge {
            context: context.into(),
        }
    }

    /// Create a server rejection error carrying the response detail
    pub fn rejected<T: Into<String>>(code: i32, reason: T) -> Self {
        CourierError::SendRejected {
            code,
            reason: reason.into(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported<T: Into<String>>(operation: T) -> Self {
        CourierError::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create an internal invariant-violation error
    pub fn internal<T: Into<String>>(reason: T) -> Self {
        CourierError::Internal {
            reason: reason.into(),
        }
    }

    /// Whether this error is a size rejection
    pub fn is_too_large(&self) -> bool {
        matches!(self, CourierError::MessageTooLarge { .. })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, CourierError>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
