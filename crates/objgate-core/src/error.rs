//! Error types for the object gateway.
//!
//! Every failure the gateway can report is a variant of [`GatewayError`].
//! Server-side variants are converted to `FAULT` replies at the worker
//! boundary; client-side variants surface from [`crate::GatewayClient`].

use crate::codec::{FaultKind, ObjectReference};
use std::time::Duration;
use thiserror::Error;

/// Main error type for the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    // Admission and transport errors
    #[error("Server at {addr} is busy, connection rejected")]
    AdmissionRejected { addr: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Request timeout after {0:?}")]
    RequestTimeout(Duration),

    // Resolution errors
    #[error("Unknown object reference: {0}")]
    UnknownReference(ObjectReference),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("No matching {member} on {type_name} for argument types ({arg_types})")]
    NoMatchingMethod {
        type_name: String,
        member: String,
        arg_types: String,
    },

    #[error("Vector lengths disagree: {targets} targets, {params} argument values")]
    AmbiguousVectorLengths { targets: usize, params: usize },

    #[error("Invocation of {member} failed: {message}")]
    InvocationFault { member: String, message: String },

    // Codec errors
    #[error("Malformed request: {message}")]
    MalformedRequest { message: String },

    /// A line longer than the limit; the rest of it was never read.
    #[error("Malformed request: line exceeds maximum of {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("Malformed reply: {message}")]
    MalformedReply { message: String },

    /// A `FAULT` reply received by the client.
    #[error("Remote fault ({kind}): {message}")]
    Remote { kind: FaultKind, message: String },

    // Configuration errors
    #[error("Configuration error for {field}: {message}")]
    Config { field: String, message: String },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl GatewayError {
    /// Shorthand for a codec failure.
    pub fn malformed(message: impl Into<String>) -> Self {
        GatewayError::MalformedRequest {
            message: message.into(),
        }
    }

    /// Wrap a transport error with context.
    pub fn connection(message: impl Into<String>, err: std::io::Error) -> Self {
        GatewayError::ConnectionFailed {
            message: format!("{}: {}", message.into(), err),
            source: Some(err),
        }
    }

    /// Wire classification of this error.
    pub fn kind(&self) -> FaultKind {
        match self {
            GatewayError::AdmissionRejected { .. } => FaultKind::AdmissionRejected,
            GatewayError::ConnectionFailed { .. } | GatewayError::Io { .. } => {
                FaultKind::ConnectionFailed
            }
            GatewayError::RequestTimeout(_) => FaultKind::RequestTimeout,
            GatewayError::UnknownReference(_) => FaultKind::UnknownReference,
            GatewayError::UnknownType(_) => FaultKind::UnknownType,
            GatewayError::NoMatchingMethod { .. } => FaultKind::NoMatchingMethod,
            GatewayError::AmbiguousVectorLengths { .. } => FaultKind::AmbiguousVectorLengths,
            GatewayError::InvocationFault { .. } => FaultKind::InvocationFault,
            GatewayError::MalformedRequest { .. }
            | GatewayError::LineTooLong { .. }
            | GatewayError::MalformedReply { .. } => FaultKind::MalformedRequest,
            GatewayError::Remote { kind, .. } => *kind,
            GatewayError::Config { .. } => FaultKind::Internal,
        }
    }

    /// Whether the transport is unusable after this error.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            GatewayError::ConnectionFailed { .. } | GatewayError::Io { .. }
        )
    }

    /// Check if this error should trigger a retry by the client.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::AdmissionRejected { .. }
                | GatewayError::RequestTimeout(_)
                | GatewayError::ConnectionFailed { .. }
        )
    }
}

/// Error raised by a registered constructor or method body.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvocationError {
    #[error("argument {index}: expected {expected}, got {actual}")]
    ArgumentType {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("receiver is not a {expected}")]
    Receiver { expected: String },

    #[error("{0}")]
    Failed(String),
}

impl InvocationError {
    pub fn failed(message: impl Into<String>) -> Self {
        InvocationError::Failed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GatewayError::UnknownReference(ObjectReference::new(42));
        assert_eq!(
            err.to_string(),
            "Unknown object reference: java.objecthashcode42"
        );
    }

    #[test]
    fn test_fault_kinds() {
        assert_eq!(
            GatewayError::AmbiguousVectorLengths {
                targets: 3,
                params: 2
            }
            .kind(),
            FaultKind::AmbiguousVectorLengths
        );
        assert_eq!(
            GatewayError::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).kind(),
            FaultKind::ConnectionFailed
        );
        assert_eq!(
            GatewayError::malformed("bad tag").kind(),
            FaultKind::MalformedRequest
        );
        let too_long = GatewayError::LineTooLong { limit: 16 };
        assert_eq!(too_long.kind(), FaultKind::MalformedRequest);
        assert!(!too_long.is_transport());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(GatewayError::RequestTimeout(Duration::from_secs(5)).is_retryable());
        assert!(GatewayError::AdmissionRejected {
            addr: "127.0.0.1:18011".into()
        }
        .is_retryable());
        assert!(!GatewayError::UnknownType("demo.Missing".into()).is_retryable());
    }
}
