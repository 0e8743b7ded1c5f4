//! # Tether - host-function bridge for sandboxed WebAssembly guests
//!
//! Tether runs untrusted WebAssembly guests that reach host capabilities
//! only through flat `(offset, len)` arguments in their own linear memory.
//! The runtime wires the pieces together: a wasmtime engine, a capability
//! set, and a linker carrying `env.host_http` and `env.host_get_env`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tether_wasm::prelude::*;
//!
//! # fn main() -> Result<(), TetherRuntimeError> {
//! let runtime = Tether::builder()
//!     .with_timeout(Duration::from_secs(5))
//!     .with_network(NetworkCapability::https_only(vec!["api.example.com".to_string()]))
//!     .with_env(EnvCapability::allow_only(["MESSAGE"]))
//!     .with_env_var("MESSAGE", "hola")
//!     .build()?;
//!
//! let module = runtime.load_file("handler.wasm")?;
//! let mut sandbox = runtime.sandbox().build()?;
//! sandbox.load_module(&module)?;
//!
//! let reply = runtime.invoke_handler(&mut sandbox, "", &Headers::new())?;
//! println!("{}", reply.body);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Your Application                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                  tether-wasm (facade)                   │
//! │  ┌──────────────┬───────────────────┬────────────────┐  │
//! │  │ tether-core  │ tether-capability │ tether-host    │  │
//! │  │ (engine,     │ (permissions)     │ (bridge,       │  │
//! │  │  sandbox)    │                   │  dispatcher)   │  │
//! │  └──────────────┴───────────────────┴────────────────┘  │
//! │                    tether-codec (wire)                  │
//! ├─────────────────────────────────────────────────────────┤
//! │                       Wasmtime                          │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod invoke;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tether_capability::{
    CapabilityId, CapabilitySet, CapabilitySetBuilder, EnvCapability, NetworkCapability,
};
use tether_core::{
    EngineConfig, EpochTicker, ExecutionError, ImportInfo, ModuleLoader, ResourceLimits, Sandbox,
    SandboxConfig, SandboxData, SharedEngine, TetherEngine, ValidatedModule,
};
use tether_host::{
    BackendFactory, BridgeConfig, EnvBridge, HostBridge, HttpDispatcher, ReqwestBackendFactory,
    TetherLinker,
};
use tracing::{debug, info};

pub use invoke::{HANDLER_RESULT_CAPACITY, HandlerReply};

// Re-export from sub-crates
pub use tether_capability;
pub use tether_codec;
pub use tether_core;
pub use tether_host;

/// Main entry point for Tether.
pub struct Tether;

impl Tether {
    /// Create a new runtime builder.
    pub fn builder() -> TetherBuilder {
        TetherBuilder::new()
    }

    /// Create a runtime with default configuration and no capabilities.
    pub fn with_defaults() -> Result<TetherRuntime, TetherRuntimeError> {
        TetherBuilder::new().build()
    }
}

/// Builder for configuring the runtime.
pub struct TetherBuilder {
    engine_config: EngineConfig,
    resource_limits: ResourceLimits,
    capabilities: CapabilitySetBuilder,
    env_vars: HashMap<String, String>,
    bridge_config: BridgeConfig,
    backend: Option<Arc<dyn BackendFactory>>,
}

impl TetherBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            engine_config: EngineConfig::default(),
            resource_limits: ResourceLimits::default(),
            capabilities: CapabilitySetBuilder::new(),
            env_vars: HashMap::new(),
            bridge_config: BridgeConfig::default(),
            backend: None,
        }
    }

    // Engine configuration

    /// Replace the engine configuration.
    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    // Resource limits

    /// Set the maximum memory limit in bytes.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.resource_limits.max_memory_bytes = bytes;
        self
    }

    /// Set the initial fuel limit.
    pub fn with_fuel_limit(mut self, fuel: u64) -> Self {
        self.resource_limits.initial_fuel = fuel;
        self
    }

    /// Set the per-call timeout. Host calls never outlive it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.resource_limits.timeout = timeout;
        self
    }

    /// Set custom resource limits.
    pub fn with_resource_limits(mut self, limits: ResourceLimits) -> Self {
        self.resource_limits = limits;
        self
    }

    // Capabilities

    /// Grant outbound HTTP.
    pub fn with_network(mut self, capability: NetworkCapability) -> Self {
        self.capabilities = self.capabilities.with(capability);
        self
    }

    /// Grant environment variable reads.
    pub fn with_env(mut self, capability: EnvCapability) -> Self {
        self.capabilities = self.capabilities.with(capability);
        self
    }

    /// Grant a custom capability.
    pub fn with_capability<C: tether_capability::Capability + 'static>(mut self, cap: C) -> Self {
        self.capabilities = self.capabilities.with(cap);
        self
    }

    // Bridge

    /// Provide one environment variable to guests.
    pub fn with_env_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(name.into(), value.into());
        self
    }

    /// Provide several environment variables to guests.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the bridge configuration.
    pub fn with_bridge_config(mut self, config: BridgeConfig) -> Self {
        self.bridge_config = config;
        self
    }

    /// Replace the HTTP backend.
    pub fn with_backend_factory(mut self, factory: Arc<dyn BackendFactory>) -> Self {
        self.backend = Some(factory);
        self
    }

    /// Build the runtime.
    pub fn build(self) -> Result<TetherRuntime, TetherRuntimeError> {
        let engine = Arc::new(TetherEngine::new(self.engine_config)?);
        let ticker = if engine.epoch_enabled() {
            Some(engine.start_epoch_ticker()?)
        } else {
            None
        };

        let capabilities = Arc::new(self.capabilities.build()?);

        let backend = self.backend.unwrap_or_else(|| {
            let mut factory = ReqwestBackendFactory::new();
            if let Some(user_agent) = &self.bridge_config.http.user_agent {
                factory = factory.with_user_agent(user_agent.as_str());
            }
            Arc::new(factory)
        });

        let http = HttpDispatcher::new(backend)
            .with_capabilities(Arc::clone(&capabilities))
            .with_config(self.bridge_config.clone());
        let env = EnvBridge::new(self.env_vars)
            .with_capabilities(Arc::clone(&capabilities))
            .with_overflow_policy(self.bridge_config.overflow_policy);

        info!(
            capabilities = ?capabilities.ids(),
            wire_format = ?self.bridge_config.wire_format,
            "Built Tether runtime"
        );

        Ok(TetherRuntime {
            engine,
            default_limits: self.resource_limits,
            capabilities,
            bridge: HostBridge::new(http, env),
            _ticker: ticker,
        })
    }
}

impl Default for TetherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured runtime.
pub struct TetherRuntime {
    engine: SharedEngine,
    default_limits: ResourceLimits,
    capabilities: Arc<CapabilitySet>,
    bridge: HostBridge,
    _ticker: Option<EpochTicker>,
}

impl TetherRuntime {
    /// Get a reference to the engine.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Get the default resource limits.
    pub fn default_limits(&self) -> &ResourceLimits {
        &self.default_limits
    }

    /// Get the granted capabilities.
    pub fn capabilities(&self) -> &Arc<CapabilitySet> {
        &self.capabilities
    }

    /// Get the host bridge.
    pub fn bridge(&self) -> &HostBridge {
        &self.bridge
    }

    /// Create a module loader.
    pub fn loader(&self) -> ModuleLoader {
        ModuleLoader::new(Arc::clone(&self.engine))
    }

    /// Load a module from bytes.
    pub fn load_bytes(&self, bytes: &[u8]) -> Result<ValidatedModule, TetherRuntimeError> {
        Ok(self.loader().load_bytes(bytes)?)
    }

    /// Load a module from a file.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ValidatedModule, TetherRuntimeError> {
        Ok(self.loader().load_file(path.as_ref())?)
    }

    /// Load a module from WAT text format.
    pub fn load_wat(&self, wat: &str) -> Result<ValidatedModule, TetherRuntimeError> {
        Ok(self.loader().load_wat(wat)?)
    }

    /// A linker carrying the bridge's host functions.
    pub fn linker<S: Send + 'static>(
        &self,
    ) -> Result<TetherLinker<SandboxData<S>>, TetherRuntimeError> {
        let mut linker = TetherLinker::new(self.engine.inner());
        self.bridge.register(&mut linker)?;
        Ok(linker)
    }

    /// Imports of `module` the bridge does not provide.
    pub fn unsatisfied_imports<'m>(
        &self,
        module: &'m ValidatedModule,
    ) -> Result<Vec<&'m ImportInfo>, TetherRuntimeError> {
        let linker = self.linker::<()>()?;
        Ok(module.unsatisfied_imports(|import| linker.is_registered(&import.module, &import.name)))
    }

    /// Capabilities the bridge's functions need that were not granted.
    pub fn missing_capabilities(&self) -> Result<Vec<CapabilityId>, TetherRuntimeError> {
        Ok(self.linker::<()>()?.missing_capabilities(&self.capabilities))
    }

    /// Create a sandbox builder with default configuration.
    pub fn sandbox(&self) -> RuntimeSandboxBuilder<'_> {
        RuntimeSandboxBuilder::new(self)
    }

    /// Load `module` into a fresh sandbox and call a no-argument export.
    pub fn execute<R: wasmtime::WasmResults>(
        &self,
        module: &ValidatedModule,
        function: &str,
    ) -> Result<R, TetherRuntimeError> {
        let mut sandbox = self.sandbox().build()?;
        sandbox.load_module(module)?;
        Ok(sandbox.call(function, ())?)
    }
}

impl std::fmt::Debug for TetherRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TetherRuntime")
            .field("default_limits", &self.default_limits)
            .field("capabilities", &self.capabilities)
            .field("bridge", &self.bridge)
            .finish()
    }
}

/// Builder for creating sandboxes from a runtime.
pub struct RuntimeSandboxBuilder<'a> {
    runtime: &'a TetherRuntime,
    limits: Option<ResourceLimits>,
}

impl<'a> RuntimeSandboxBuilder<'a> {
    fn new(runtime: &'a TetherRuntime) -> Self {
        Self {
            runtime,
            limits: None,
        }
    }

    fn limits_mut(&mut self) -> &mut ResourceLimits {
        self.limits
            .get_or_insert_with(|| self.runtime.default_limits.clone())
    }

    /// Override resource limits.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Override memory limit.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.limits_mut().max_memory_bytes = bytes;
        self
    }

    /// Override fuel limit.
    pub fn with_fuel_limit(mut self, fuel: u64) -> Self {
        self.limits_mut().initial_fuel = fuel;
        self
    }

    /// Override timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.limits_mut().timeout = timeout;
        self
    }

    /// Build the sandbox.
    pub fn build(self) -> Result<Sandbox<()>, TetherRuntimeError> {
        self.build_with_state(())
    }

    /// Build the sandbox with custom state.
    pub fn build_with_state<S: Send + 'static>(
        self,
        state: S,
    ) -> Result<Sandbox<S>, TetherRuntimeError> {
        let limits = self
            .limits
            .unwrap_or_else(|| self.runtime.default_limits.clone());
        let config = SandboxConfig::default().with_limits(limits);
        let linker = self.runtime.linker::<S>()?;

        let sandbox = Sandbox::with_linker(
            Arc::clone(&self.runtime.engine),
            state,
            config,
            linker.into_inner(),
        )?;
        debug!(sandbox_id = %sandbox.id(), "Built sandbox with host bridge");
        Ok(sandbox)
    }
}

/// Errors from the runtime.
#[derive(Debug, thiserror::Error)]
pub enum TetherRuntimeError {
    /// Engine error.
    #[error("Engine error: {0}")]
    Engine(#[from] tether_core::EngineError),

    /// Module error.
    #[error("Module error: {0}")]
    Module(#[from] tether_core::ModuleError),

    /// Execution error.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Capability error.
    #[error("Capability error: {0}")]
    Capability(#[from] tether_capability::CapabilityError),

    /// Host bridge error.
    #[error("Host error: {0}")]
    Host(#[from] tether_host::HostError),

    /// The guest does not export a function the handler protocol needs.
    #[error("Guest does not export '{0}'")]
    MissingExport(&'static str),

    /// The request cannot be handed to the guest.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The guest's response did not fit the result buffer.
    #[error("Handler response of {len} bytes exceeds {capacity} byte buffer")]
    ResponseTooLarge {
        /// Encoded response length.
        len: usize,
        /// Buffer size.
        capacity: usize,
    },

    /// The guest's response could not be decoded.
    #[error("Malformed handler response: {0}")]
    MalformedResponse(String),

    /// The handler reported an error.
    #[error("Handler failed: {0}")]
    HandlerFailed(tether_codec::Failure),
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{HandlerReply, Tether, TetherBuilder, TetherRuntime, TetherRuntimeError};

    // Core types
    pub use tether_core::{
        EngineConfig, ModuleLoader, ResourceLimits, Sandbox, SandboxBuilder, SandboxConfig,
        TetherEngine, ValidatedModule,
    };

    // Capability types
    pub use tether_capability::{
        Capability, CapabilityId, CapabilitySet, EnvCapability, HostPattern, NetworkCapability,
        PermissionResult,
    };

    // Bridge types
    pub use tether_codec::{Headers, WireFormat};
    pub use tether_host::{BridgeConfig, OverflowPolicy};

    // Common std types
    pub use std::sync::Arc;
    pub use std::time::Duration;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_capability::standard_ids;

    #[test]
    fn test_tether_builder() {
        let runtime = Tether::builder()
            .with_memory_limit(32 * 1024 * 1024)
            .with_fuel_limit(100_000)
            .with_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(runtime.default_limits().max_memory_bytes, 32 * 1024 * 1024);
        assert_eq!(runtime.default_limits().initial_fuel, 100_000);
        assert!(runtime.capabilities().is_empty());
    }

    #[test]
    fn test_builder_presets() {
        let runtime = Tether::builder()
            .with_engine_config(EngineConfig::default().with_epochs(false))
            .with_resource_limits(ResourceLimits::minimal())
            .with_capability(EnvCapability::allow_all())
            .build()
            .unwrap();

        assert!(!runtime.engine().epoch_enabled());
        assert_eq!(runtime.default_limits().initial_fuel, 10_000);
        assert!(runtime.capabilities().has(&standard_ids::ENV));
    }

    #[test]
    fn test_load_and_execute() {
        let runtime = Tether::with_defaults().unwrap();

        let module = runtime
            .load_wat(
                r#"
            (module
                (func (export "answer") (result i32)
                    i32.const 42
                )
            )
        "#,
            )
            .unwrap();

        let result: i32 = runtime.execute(&module, "answer").unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn test_sandbox_builder_overrides() {
        let runtime = Tether::builder().with_fuel_limit(1_000_000).build().unwrap();

        let sandbox = runtime
            .sandbox()
            .with_fuel_limit(500_000)
            .with_memory_limit(16 * 1024 * 1024)
            .build()
            .unwrap();

        assert_eq!(sandbox.remaining_fuel(), Some(500_000));
    }

    #[test]
    fn test_missing_capabilities() {
        let runtime = Tether::builder()
            .with_network(NetworkCapability::allow_all())
            .build()
            .unwrap();

        assert_eq!(runtime.missing_capabilities().unwrap(), vec![standard_ids::ENV]);
    }

    #[test]
    fn test_unsatisfied_imports() {
        let runtime = Tether::with_defaults().unwrap();
        let module = runtime
            .load_wat(
                r#"
            (module
                (import "env" "host_http"
                    (func (param i32 i32 i32 i32 i32 i32 i32 i32 i32 i32)))
                (import "env" "host_kv_get" (func (param i32 i32)))
                (memory (export "memory") 1)
            )
        "#,
            )
            .unwrap();

        let missing = runtime.unsatisfied_imports(&module).unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "host_kv_get");
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _runtime = Tether::builder().build().unwrap();
    }
}
