//! Result of one capability call.
//!
//! Inside the host the outcome is a two-variant type. It only becomes a single
//! string when a [`WireFormat`](crate::WireFormat) renders it at the ABI edge.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a failed capability call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network, DNS or TLS failure reported by the backend.
    Transport,
    /// The requested method is not one the bridge implements.
    UnsupportedMethod,
    /// Call arguments could not be decoded.
    Encoding,
    /// The caller lacks the capability for this request.
    PermissionDenied,
    /// The call deadline passed before the backend answered.
    Timeout,
    /// The calling context was cancelled.
    Cancelled,
    /// Decoded from a format that does not carry the kind.
    Unclassified,
}

impl FailureKind {
    /// Stable name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transport => "transport",
            FailureKind::UnsupportedMethod => "unsupported_method",
            FailureKind::Encoding => "encoding",
            FailureKind::PermissionDenied => "permission_denied",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Unclassified => "unclassified",
        }
    }

    /// Parse a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "transport" => FailureKind::Transport,
            "unsupported_method" => FailureKind::UnsupportedMethod,
            "encoding" => FailureKind::Encoding,
            "permission_denied" => FailureKind::PermissionDenied,
            "timeout" => FailureKind::Timeout,
            "cancelled" => FailureKind::Cancelled,
            "unclassified" => FailureKind::Unclassified,
            _ => return None,
        })
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed capability call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// What went wrong.
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
    /// Numeric code; 0 means the failure carries no code.
    pub code: u32,
}

impl Failure {
    /// Create a failure without a code.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: 0,
        }
    }

    /// Attach a numeric code.
    pub fn with_code(mut self, code: u32) -> Self {
        self.code = code;
        self
    }

    /// Failure for a method the bridge does not implement.
    pub fn unsupported_method(method: &str) -> Self {
        Self::new(
            FailureKind::UnsupportedMethod,
            format!("{method} is not yet implemented"),
        )
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (code {})", self.message, self.code)
        }
    }
}

impl std::error::Error for Failure {}

/// Outcome of a capability call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The call succeeded with this payload.
    Success(String),
    /// The call failed.
    Failure(Failure),
}

impl Outcome {
    /// Create a failed outcome.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Outcome::Failure(Failure::new(kind, message))
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The failure kind, if the call failed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure.kind),
        }
    }

    /// Convert to a standard `Result`.
    pub fn into_result(self) -> Result<String, Failure> {
        match self {
            Outcome::Success(payload) => Ok(payload),
            Outcome::Failure(failure) => Err(failure),
        }
    }
}

impl From<Result<String, Failure>> for Outcome {
    fn from(result: Result<String, Failure>) -> Self {
        match result {
            Ok(payload) => Outcome::Success(payload),
            Err(failure) => Outcome::Failure(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_parse_back() {
        for kind in [
            FailureKind::Transport,
            FailureKind::UnsupportedMethod,
            FailureKind::Encoding,
            FailureKind::PermissionDenied,
            FailureKind::Timeout,
            FailureKind::Cancelled,
            FailureKind::Unclassified,
        ] {
            assert_eq!(FailureKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(FailureKind::parse("nope"), None);
    }

    #[test]
    fn test_unsupported_method_message() {
        let failure = Failure::unsupported_method("PUT");
        assert_eq!(failure.kind, FailureKind::UnsupportedMethod);
        assert_eq!(failure.message, "PUT is not yet implemented");
        assert_eq!(failure.code, 0);
    }

    #[test]
    fn test_outcome_conversions() {
        let ok: Outcome = Ok("body".to_string()).into();
        assert!(ok.is_success());
        assert_eq!(ok.failure_kind(), None);

        let failed = Outcome::failure(FailureKind::Transport, "refused");
        assert_eq!(failed.failure_kind(), Some(FailureKind::Transport));
        assert_eq!(failed.into_result().unwrap_err().to_string(), "refused");
    }
}
