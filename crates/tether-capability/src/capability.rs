//! Core capability trait and types.
//!
//! A capability is an explicit grant that lets a guest reach one kind of host
//! resource. Host functions describe what they are about to do as an
//! [`Action`] and ask the granted capabilities whether it is permitted.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;

/// Unique identifier for a capability type.
///
/// ```
/// use tether_capability::CapabilityId;
///
/// assert_ne!(CapabilityId::new("network"), CapabilityId::new("env"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityId(Cow<'static, str>);

impl CapabilityId {
    /// Create a new capability ID.
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for CapabilityId {
    fn from(s: &'static str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CapabilityId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Something a host function wants to do on behalf of a guest.
pub trait Action: fmt::Debug + Send + Sync + 'static {
    /// Action type, namespaced by capability (e.g. `"net:http"`, `"env:read"`).
    fn action_type(&self) -> &str;

    /// Human-readable description of the action.
    fn description(&self) -> String {
        format!("{:?}", self)
    }

    /// Access the concrete action so a capability can inspect its fields.
    fn as_any(&self) -> &dyn Any;
}

/// Result of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionResult {
    /// The action is allowed.
    Allowed,
    /// The action is denied with a reason.
    Denied(DenialReason),
    /// The capability doesn't handle this action type; delegate to another.
    NotApplicable,
}

impl PermissionResult {
    /// Check if the result is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, PermissionResult::Allowed)
    }

    /// Check if the result is denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, PermissionResult::Denied(_))
    }

    /// Convert to a `Result`, naming `action` when nothing handled it.
    pub fn into_result(self, action: &dyn Action) -> Result<(), CapabilityError> {
        match self {
            PermissionResult::Allowed => Ok(()),
            PermissionResult::Denied(reason) => Err(CapabilityError::PermissionDenied { reason }),
            PermissionResult::NotApplicable => Err(CapabilityError::NoCapabilityFound {
                action: action.action_type().to_string(),
            }),
        }
    }
}

/// Reason for denying an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialReason {
    /// The capability that denied the action.
    pub capability: CapabilityId,
    /// Human-readable explanation.
    pub message: String,
    /// The action that was denied.
    pub action: String,
}

impl DenialReason {
    /// Create a new denial reason.
    pub fn new(
        capability: CapabilityId,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            capability,
            action: action.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} - {}", self.capability, self.action, self.message)
    }
}

/// Core trait for all capabilities.
///
/// Absence of a capability means denial: a [`CapabilitySet`](crate::CapabilitySet)
/// that finds no capability willing to answer for an action denies it.
pub trait Capability: Send + Sync + fmt::Debug {
    /// Get the unique identifier for this capability type.
    fn id(&self) -> CapabilityId;

    /// Get the human-readable name of this capability.
    fn name(&self) -> &str;

    /// Check if this capability permits a specific action.
    ///
    /// Returns `NotApplicable` for action types the capability does not own.
    fn permits(&self, action: &dyn Action) -> PermissionResult;

    /// Action types this capability answers for.
    fn handled_action_types(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Validate that this capability's configuration is usable.
    fn validate(&self) -> Result<(), CapabilityError> {
        Ok(())
    }
}

/// A boxed capability trait object.
pub type BoxedCapability = Box<dyn Capability>;

/// A shared capability reference.
pub type SharedCapability = Arc<dyn Capability>;

/// Standard capability IDs for built-in capabilities.
pub mod standard_ids {
    use super::CapabilityId;

    /// Network capability ID.
    pub const NETWORK: CapabilityId = CapabilityId(std::borrow::Cow::Borrowed("network"));

    /// Environment variables capability ID.
    pub const ENV: CapabilityId = CapabilityId(std::borrow::Cow::Borrowed("env"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestAction {
        action_type: String,
    }

    impl Action for TestAction {
        fn action_type(&self) -> &str {
            &self.action_type
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct TestCapability {
        allowed: Vec<String>,
    }

    impl Capability for TestCapability {
        fn id(&self) -> CapabilityId {
            CapabilityId::new("test")
        }

        fn name(&self) -> &str {
            "Test Capability"
        }

        fn permits(&self, action: &dyn Action) -> PermissionResult {
            if self.allowed.iter().any(|a| a == action.action_type()) {
                PermissionResult::Allowed
            } else {
                PermissionResult::Denied(DenialReason::new(
                    self.id(),
                    action.action_type(),
                    "Not in allowed list",
                ))
            }
        }
    }

    #[test]
    fn test_capability_id() {
        assert_eq!(CapabilityId::new("test"), CapabilityId::from("test"));
        assert_ne!(CapabilityId::new("test"), CapabilityId::new("other"));
        assert_eq!(standard_ids::NETWORK.as_str(), "network");
        assert_eq!(standard_ids::ENV.as_str(), "env");
    }

    #[test]
    fn test_capability_permits() {
        let cap = TestCapability {
            allowed: vec!["net:http".to_string()],
        };

        let http = TestAction {
            action_type: "net:http".to_string(),
        };
        let env = TestAction {
            action_type: "env:read".to_string(),
        };

        assert!(cap.permits(&http).is_allowed());
        assert!(cap.permits(&env).is_denied());
    }

    #[test]
    fn test_into_result_names_action() {
        let action = TestAction {
            action_type: "env:read".to_string(),
        };

        assert!(PermissionResult::Allowed.into_result(&action).is_ok());

        let err = PermissionResult::NotApplicable
            .into_result(&action)
            .unwrap_err();
        assert!(err.to_string().contains("env:read"));
    }
}
