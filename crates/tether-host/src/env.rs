//! The `host_get_env` host function.
//!
//! Variables come from a map the embedder supplies, never from the host
//! process environment. A variable that is missing and one the guest may not
//! read look the same from inside the guest.

use std::collections::HashMap;
use std::sync::Arc;

use tether_capability::{CapabilitySet, EnvAction};
use tether_codec::abi::ENV_NOT_FOUND;
use tracing::{debug, warn};

use crate::error::HostResult;
use crate::memory::{self, GuestMemory, GuestRegion, OverflowPolicy, ReturnBuffer};

/// Serves environment variables to guests.
#[derive(Debug, Clone, Default)]
pub struct EnvBridge {
    vars: HashMap<String, String>,
    capabilities: Option<Arc<CapabilitySet>>,
    overflow_policy: OverflowPolicy,
}

impl EnvBridge {
    /// Create a bridge over `vars` that lets the guest read all of them.
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self {
            vars,
            ..Self::default()
        }
    }

    /// Check every read against `capabilities`.
    pub fn with_capabilities(mut self, capabilities: Arc<CapabilitySet>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Set the overflow policy for values.
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Number of configured variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether no variables are configured.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Look up a variable the guest is allowed to read.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        if let Some(capabilities) = &self.capabilities {
            let action = EnvAction::Read {
                name: name.to_string(),
            };
            if let Err(err) = capabilities.require(&action) {
                warn!(name, error = %err, "Env read denied");
                return None;
            }
        }

        let value = self.vars.get(name).map(String::as_str);
        debug!(name, found = value.is_some(), "Env lookup");
        value
    }

    /// Handle one `host_get_env` call against guest memory.
    ///
    /// Returns the number of bytes written, or [`ENV_NOT_FOUND`].
    pub fn handle<M: GuestMemory + ?Sized>(
        &self,
        memory: &mut M,
        name: GuestRegion,
        ret: ReturnBuffer,
    ) -> HostResult<i32> {
        let name = memory::read_string(memory, name)?;

        match self.lookup(&name) {
            Some(value) => {
                let written = memory::write_string(memory, value, ret, self.overflow_policy)?;
                Ok(i32::try_from(written).unwrap_or(i32::MAX))
            }
            None => Ok(ENV_NOT_FOUND),
        }
    }
}
