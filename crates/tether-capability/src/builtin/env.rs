//! Environment variable capability.

use std::any::Any;
use std::collections::HashSet;

use crate::capability::{
    Action, Capability, CapabilityId, DenialReason, PermissionResult, standard_ids,
};

/// Action type for reading an environment variable.
pub const ENV_READ: &str = "env:read";

/// Actions related to the guest's environment.
#[derive(Debug, Clone)]
pub enum EnvAction {
    /// Read one variable.
    Read {
        /// Variable name.
        name: String,
    },
}

impl Action for EnvAction {
    fn action_type(&self) -> &str {
        match self {
            EnvAction::Read { .. } => ENV_READ,
        }
    }

    fn description(&self) -> String {
        match self {
            EnvAction::Read { name } => format!("Read env var {}", name),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Capability for reading the variables configured on a runtime.
///
/// Grants either every variable or a fixed allow-list of names.
#[derive(Debug, Clone)]
pub struct EnvCapability {
    allowed: Option<HashSet<String>>,
}

impl EnvCapability {
    /// Allow reading every configured variable.
    pub fn allow_all() -> Self {
        Self { allowed: None }
    }

    /// Allow reading only the named variables.
    pub fn allow_only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Check if a variable name may be read.
    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.as_ref().is_none_or(|names| names.contains(name))
    }
}

impl Capability for EnvCapability {
    fn id(&self) -> CapabilityId {
        standard_ids::ENV.clone()
    }

    fn name(&self) -> &str {
        "Environment"
    }

    fn permits(&self, action: &dyn Action) -> PermissionResult {
        let Some(EnvAction::Read { name }) = action.as_any().downcast_ref::<EnvAction>() else {
            return PermissionResult::NotApplicable;
        };

        if self.is_allowed(name) {
            PermissionResult::Allowed
        } else {
            PermissionResult::Denied(DenialReason::new(
                self.id(),
                ENV_READ,
                format!("Variable not allowed: {}", name),
            ))
        }
    }

    fn handled_action_types(&self) -> Vec<&'static str> {
        vec![ENV_READ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::NetworkAction;

    fn read(name: &str) -> EnvAction {
        EnvAction::Read {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_allow_all() {
        let cap = EnvCapability::allow_all();
        assert!(cap.permits(&read("MESSAGE")).is_allowed());
        assert!(cap.permits(&read("ANYTHING")).is_allowed());
    }

    #[test]
    fn test_allow_only() {
        let cap = EnvCapability::allow_only(["MESSAGE"]);
        assert!(cap.permits(&read("MESSAGE")).is_allowed());
        assert!(cap.permits(&read("SECRET")).is_denied());
    }

    #[test]
    fn test_ignores_other_actions() {
        let cap = EnvCapability::allow_all();
        let action = NetworkAction::HttpRequest {
            url: "https://example.com".to_string(),
            method: "GET".to_string(),
        };
        assert_eq!(cap.permits(&action), PermissionResult::NotApplicable);
    }
}
