//! Error types for the host function system.
//!
//! A [`HostError`] returned from a host function becomes a wasm trap: it is
//! fatal for the guest call. Capability failures are never `HostError`s;
//! they travel back to the guest in-band as an
//! [`Outcome`](tether_codec::Outcome).

use thiserror::Error;
use tether_codec::FailureKind;

/// Errors raised at the guest memory boundary or during registration.
#[derive(Debug, Error)]
pub enum HostError {
    /// The guest does not export its linear memory.
    #[error("Memory export 'memory' not found")]
    MemoryNotFound,

    /// A guest-supplied region lies outside linear memory.
    #[error("Memory access out of bounds: offset={offset}, len={len}, memory_size={memory_size}")]
    MemoryAccessOutOfBounds {
        /// The offset attempted.
        offset: u32,
        /// The length attempted.
        len: u32,
        /// The actual memory size.
        memory_size: usize,
    },

    /// Guest bytes that should hold text are not UTF-8.
    #[error("Invalid UTF-8 at offset {offset}: {reason}")]
    InvalidUtf8 {
        /// Start of the region.
        offset: u32,
        /// Decoder message.
        reason: String,
    },

    /// The result does not fit the guest's return buffer and the overflow
    /// policy is `Reject`.
    #[error("Result of {required} bytes does not fit return buffer of {capacity} bytes")]
    ReturnBufferOverflow {
        /// Bytes needed.
        required: usize,
        /// Bytes available.
        capacity: usize,
    },

    /// Function registration failed.
    #[error("Failed to register function '{module}::{name}': {reason}")]
    RegistrationFailed {
        /// The module name.
        module: String,
        /// The function name.
        name: String,
        /// The reason for failure.
        reason: String,
    },

    /// Function already registered.
    #[error("Function already registered: {module}::{name}")]
    AlreadyRegistered {
        /// The module name.
        module: String,
        /// The function name.
        name: String,
    },
}

/// Result type for host operations.
pub type HostResult<T> = std::result::Result<T, HostError>;

/// A failed outbound request, as reported by an [`HttpBackend`](crate::HttpBackend).
///
/// The display text is exactly the message the guest receives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request did not complete within its time budget.
    #[error("{0}")]
    Timeout(String),

    /// The request could not be built (bad URL, header name or value).
    #[error("{0}")]
    InvalidRequest(String),

    /// Connecting, sending or reading the response failed.
    #[error("{0}")]
    Request(String),
}

impl TransportError {
    /// The in-band failure kind this error maps to.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            TransportError::Timeout(_) => FailureKind::Timeout,
            TransportError::InvalidRequest(_) | TransportError::Request(_) => {
                FailureKind::Transport
            }
        }
    }
}
