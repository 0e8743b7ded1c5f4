//! Tether Capability System
//!
//! Capabilities are explicit, opt-in grants that decide which host functions
//! a guest may use and with which arguments. The HTTP bridge asks the
//! [`CapabilitySet`] before every request; the environment bridge asks before
//! every variable read.
//!
//! - All permissions must be explicitly granted (no ambient authority)
//! - Absence of a capability guarantees denial
//!
//! # Usage
//!
//! ```
//! use tether_capability::{CapabilitySetBuilder, EnvAction, EnvCapability, NetworkCapability};
//!
//! let capabilities = CapabilitySetBuilder::new()
//!     .with(NetworkCapability::https_only(vec!["api.example.com".to_string()]))
//!     .with(EnvCapability::allow_only(["MESSAGE"]))
//!     .build()
//!     .unwrap();
//!
//! let read = EnvAction::Read { name: "MESSAGE".to_string() };
//! assert!(capabilities.check_permission(&read).is_allowed());
//! ```

pub mod builtin;
pub mod capability;
pub mod error;
pub mod set;

pub use capability::{
    Action, BoxedCapability, Capability, CapabilityId, DenialReason, PermissionResult,
    SharedCapability, standard_ids,
};
pub use error::{CapabilityError, CapabilityResult};
pub use set::{CapabilitySet, CapabilitySetBuilder};

pub use builtin::{EnvAction, EnvCapability, HostPattern, NetworkAction, NetworkCapability};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::builtin::{EnvAction, EnvCapability, NetworkAction, NetworkCapability};
    pub use crate::capability::{Action, Capability, CapabilityId, PermissionResult};
    pub use crate::error::{CapabilityError, CapabilityResult};
    pub use crate::set::{CapabilitySet, CapabilitySetBuilder};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_set_with_builtins() {
        let set = CapabilitySetBuilder::new()
            .with(NetworkCapability::allow_all())
            .with(EnvCapability::allow_all())
            .build()
            .unwrap();

        assert!(set.has(&standard_ids::NETWORK));
        assert!(set.has(&standard_ids::ENV));
    }

    #[test]
    fn test_network_denial_reaches_set() {
        let set = CapabilitySetBuilder::new()
            .with(NetworkCapability::https_only(vec!["api.example.com".to_string()]))
            .with(EnvCapability::allow_all())
            .build()
            .unwrap();

        let allowed = NetworkAction::HttpRequest {
            url: "https://api.example.com/v1".to_string(),
            method: "GET".to_string(),
        };
        let denied = NetworkAction::HttpRequest {
            url: "https://other.example.com/v1".to_string(),
            method: "GET".to_string(),
        };

        assert!(set.check_permission(&allowed).is_allowed());
        assert!(set.require(&denied).is_err());
    }
}
