//! Capability set management.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::capability::{
    Action, BoxedCapability, Capability, CapabilityId, DenialReason, PermissionResult,
    SharedCapability,
};
use crate::error::{CapabilityError, CapabilityResult};

/// The capabilities granted to a runtime.
///
/// A set is shared (`Arc<CapabilitySet>`) between every host function of a
/// runtime and is only read while guests execute.
#[derive(Default)]
pub struct CapabilitySet {
    capabilities: DashMap<CapabilityId, SharedCapability>,
}

impl CapabilitySet {
    /// Create an empty capability set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a capability to this set.
    ///
    /// # Errors
    ///
    /// Returns an error if a capability with the same ID already exists or
    /// the capability fails validation.
    pub fn grant<C: Capability + 'static>(&self, capability: C) -> CapabilityResult<()> {
        self.grant_shared(Arc::new(capability))
    }

    /// Grant a boxed capability.
    pub fn grant_boxed(&self, capability: BoxedCapability) -> CapabilityResult<()> {
        self.grant_shared(capability.into())
    }

    /// Grant a shared capability.
    pub fn grant_shared(&self, capability: SharedCapability) -> CapabilityResult<()> {
        let id = capability.id();

        if self.capabilities.contains_key(&id) {
            return Err(CapabilityError::AlreadyExists(id));
        }

        capability.validate()?;
        self.capabilities.insert(id.clone(), capability);

        info!(capability = %id, "Capability granted");
        Ok(())
    }

    /// Revoke a capability from this set.
    pub fn revoke(&self, id: &CapabilityId) -> Option<SharedCapability> {
        self.capabilities.remove(id).map(|(_, cap)| {
            info!(capability = %id, "Capability revoked");
            cap
        })
    }

    /// Check if a capability is granted.
    pub fn has(&self, id: &CapabilityId) -> bool {
        self.capabilities.contains_key(id)
    }

    /// Get a capability by ID.
    pub fn get(&self, id: &CapabilityId) -> Option<SharedCapability> {
        self.capabilities.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Get the number of capabilities in the set.
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Get all capability IDs.
    pub fn ids(&self) -> Vec<CapabilityId> {
        self.capabilities.iter().map(|r| r.key().clone()).collect()
    }

    /// Check if an action is permitted by any capability in the set.
    ///
    /// The first `Allowed` answer wins. Otherwise the first denial is
    /// returned, and an action no capability answers for is denied.
    pub fn check_permission(&self, action: &dyn Action) -> PermissionResult {
        let mut denial: Option<DenialReason> = None;

        for entry in self.capabilities.iter() {
            match entry.value().permits(action) {
                PermissionResult::Allowed => {
                    debug!(
                        capability = %entry.key(),
                        action_type = action.action_type(),
                        "Permission allowed"
                    );
                    return PermissionResult::Allowed;
                }
                PermissionResult::Denied(reason) => {
                    debug!(
                        capability = %entry.key(),
                        action_type = action.action_type(),
                        reason = %reason,
                        "Permission denied"
                    );
                    denial.get_or_insert(reason);
                }
                PermissionResult::NotApplicable => continue,
            }
        }

        if let Some(reason) = denial {
            return PermissionResult::Denied(reason);
        }

        warn!(
            action_type = action.action_type(),
            "No capability found for action"
        );

        PermissionResult::Denied(DenialReason::new(
            CapabilityId::new("none"),
            action.action_type(),
            "No capability grants this permission",
        ))
    }

    /// Require that an action is permitted.
    pub fn require(&self, action: &dyn Action) -> CapabilityResult<()> {
        self.check_permission(action).into_result(action)
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("capabilities", &self.ids())
            .finish()
    }
}

/// Builder for constructing capability sets.
#[derive(Default)]
pub struct CapabilitySetBuilder {
    capabilities: Vec<BoxedCapability>,
}

impl CapabilitySetBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability.
    pub fn with<C: Capability + 'static>(mut self, capability: C) -> Self {
        self.capabilities.push(Box::new(capability));
        self
    }

    /// Whether no capability has been added yet.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Build the capability set.
    pub fn build(self) -> CapabilityResult<CapabilitySet> {
        let set = CapabilitySet::new();
        for capability in self.capabilities {
            set.grant_boxed(capability)?;
        }
        Ok(set)
    }
}
