//! Linker wrapper that records what each host function needs.
//!
//! [`TetherLinker`] wraps wasmtime's `Linker` and remembers every function it
//! registers together with the capability it requires, so a runtime can
//! report missing grants and unsatisfied imports before instantiating.

use tether_capability::{CapabilityId, CapabilitySet};
use tracing::debug;
use wasmtime::{Engine, Linker};

use crate::error::{HostError, HostResult};

/// Information about a registered host function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredFunction {
    /// The import module name.
    pub module: String,
    /// The function name.
    pub name: String,
    /// Required capability, if any.
    pub required_capability: Option<CapabilityId>,
}

/// A wrapper around Wasmtime's `Linker` tracking registered host functions.
pub struct TetherLinker<T> {
    inner: Linker<T>,
    registered: Vec<RegisteredFunction>,
}

impl<T> TetherLinker<T> {
    /// Create a new linker for the given engine.
    pub fn new(engine: &Engine) -> Self {
        Self {
            inner: Linker::new(engine),
            registered: Vec::new(),
        }
    }

    /// Get a reference to the underlying Wasmtime linker.
    pub fn inner(&self) -> &Linker<T> {
        &self.inner
    }

    /// Consume this linker and return the underlying Wasmtime linker.
    pub fn into_inner(self) -> Linker<T> {
        self.inner
    }

    /// Get the list of registered functions.
    pub fn registered_functions(&self) -> &[RegisteredFunction] {
        &self.registered
    }

    /// Check if a function is already registered.
    pub fn is_registered(&self, module: &str, name: &str) -> bool {
        self.registered
            .iter()
            .any(|f| f.module == module && f.name == name)
    }

    /// Register a host function that needs no capability.
    pub fn func_wrap<Params, Results>(
        &mut self,
        module: &str,
        name: &str,
        func: impl wasmtime::IntoFunc<T, Params, Results>,
    ) -> HostResult<&mut Self> {
        self.func_wrap_with_capability(module, name, None, func)
    }

    /// Register a host function with a required capability.
    pub fn func_wrap_with_capability<Params, Results>(
        &mut self,
        module: &str,
        name: &str,
        required_capability: Option<CapabilityId>,
        func: impl wasmtime::IntoFunc<T, Params, Results>,
    ) -> HostResult<&mut Self> {
        if self.is_registered(module, name) {
            return Err(HostError::AlreadyRegistered {
                module: module.to_string(),
                name: name.to_string(),
            });
        }

        self.inner
            .func_wrap(module, name, func)
            .map_err(|e| HostError::RegistrationFailed {
                module: module.to_string(),
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        debug!(module, name, capability = ?required_capability, "Registered host function");
        self.registered.push(RegisteredFunction {
            module: module.to_string(),
            name: name.to_string(),
            required_capability,
        });

        Ok(self)
    }

    /// Capabilities required by registered functions but absent from `capabilities`.
    pub fn missing_capabilities(&self, capabilities: &CapabilitySet) -> Vec<CapabilityId> {
        let mut missing = Vec::new();

        for func in &self.registered {
            if let Some(required) = &func.required_capability {
                if !capabilities.has(required) && !missing.contains(required) {
                    missing.push(required.clone());
                }
            }
        }

        missing
    }
}

impl<T> std::fmt::Debug for TetherLinker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TetherLinker")
            .field("registered_functions", &self.registered.len())
            .finish()
    }
}
