//! Sandbox execution environment.
//!
//! A [`Sandbox`] owns one Wasmtime store and at most one instance. Each call
//! into the guest is bounded by fuel, memory limits and a wall-clock deadline
//! that host functions can observe through [`SandboxData`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;
use wasmtime::{Instance, Linker, Memory, Store, StoreLimits, StoreLimitsBuilder, Trap, Val};

use crate::config::{ResourceLimits, SandboxConfig};
use crate::engine::SharedEngine;
use crate::error::{ExecutionError, ExecutionResult, TrapInfo};
use crate::module::ValidatedModule;

/// Name of the linear memory export host functions read and write.
pub const MEMORY_EXPORT: &str = "memory";

/// Unique identifier for a sandbox instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SandboxId(Uuid);

impl SandboxId {
    /// Create a new random sandbox ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SandboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SandboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cross-thread cancellation flag for a sandbox's calls.
///
/// Cancellation is sticky: once set, every later host call on the sandbox
/// reports `Cancelled` until [`Sandbox::reset`] issues a fresh token.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Data stored in the Wasmtime store, visible to host functions.
pub struct SandboxData<S = ()> {
    /// Unique identifier for this sandbox.
    pub id: SandboxId,
    /// User-provided state.
    pub user_state: S,
    /// Store limits.
    pub limits: StoreLimits,
    /// Execution metrics.
    pub metrics: SandboxMetrics,
    config: SandboxConfig,
    cancel: CancelToken,
    call_deadline: Option<Instant>,
}

impl<S> SandboxData<S> {
    /// Access the user state.
    pub fn state(&self) -> &S {
        &self.user_state
    }

    /// Access the user state mutably.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.user_state
    }

    /// The cancellation token of the owning sandbox.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Instant by which the current guest call must finish, if one is running.
    pub fn call_deadline(&self) -> Option<Instant> {
        self.call_deadline
    }

    /// Count one host function invocation.
    pub fn record_host_call(&mut self) {
        self.metrics.host_calls += 1;
    }
}

/// Metrics collected for the most recent call.
#[derive(Debug, Clone, Default)]
pub struct SandboxMetrics {
    /// When execution started.
    pub start_time: Option<Instant>,
    /// When execution ended.
    pub end_time: Option<Instant>,
    /// Total fuel consumed.
    pub fuel_consumed: u64,
    /// Number of host function calls.
    pub host_calls: u64,
}

impl SandboxMetrics {
    /// Get the execution duration.
    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }
}

/// A sandboxed execution environment for WebAssembly modules.
///
/// # Type Parameters
///
/// - `S`: User-provided state that host functions can reach.
///
/// # Example
///
/// ```
/// use tether_core::{IntoShared, ModuleLoader, SandboxBuilder, TetherEngine};
///
/// let engine = TetherEngine::default_engine().unwrap().into_shared();
/// let module = ModuleLoader::new(engine.clone())
///     .load_wat(r#"(module (func (export "answer") (result i32) i32.const 42))"#)
///     .unwrap();
///
/// let mut sandbox = SandboxBuilder::<()>::new(engine).build().unwrap();
/// sandbox.load_module(&module).unwrap();
/// let answer: i32 = sandbox.call("answer", ()).unwrap();
/// assert_eq!(answer, 42);
/// ```
pub struct Sandbox<S = ()> {
    engine: SharedEngine,
    store: Store<SandboxData<S>>,
    linker: Linker<SandboxData<S>>,
    instance: Option<Instance>,
    module: Option<ValidatedModule>,
}

impl<S: Send + 'static> Sandbox<S> {
    /// Create a new sandbox with an empty linker.
    pub fn new(
        engine: SharedEngine,
        user_state: S,
        config: SandboxConfig,
    ) -> ExecutionResult<Self> {
        let linker = Linker::new(engine.inner());
        Self::with_linker(engine, user_state, config, linker)
    }

    /// Create a new sandbox whose guests link against `linker`.
    pub fn with_linker(
        engine: SharedEngine,
        user_state: S,
        config: SandboxConfig,
        linker: Linker<SandboxData<S>>,
    ) -> ExecutionResult<Self> {
        let id = SandboxId::new();

        let limits = StoreLimitsBuilder::new()
            .memory_size(config.limits.max_memory_bytes)
            .table_elements(config.limits.max_table_elements as usize)
            .instances(1)
            .tables(10)
            .memories(config.limits.max_memories as usize)
            .build();

        let initial_fuel = config.limits.initial_fuel;
        let data = SandboxData {
            id,
            user_state,
            limits,
            metrics: SandboxMetrics::default(),
            config,
            cancel: CancelToken::new(),
            call_deadline: None,
        };

        let mut store = Store::new(engine.inner(), data);
        store.limiter(|data| &mut data.limits);

        if engine.fuel_enabled() {
            store.set_fuel(initial_fuel)?;
        }

        if engine.epoch_enabled() {
            store.epoch_deadline_trap();
            let timeout = store.data().config.limits.timeout;
            store.set_epoch_deadline(engine.config().ticks_for(timeout));
        }

        info!(sandbox_id = %id, "Created new sandbox");

        Ok(Self {
            engine,
            store,
            linker,
            instance: None,
            module: None,
        })
    }

    /// Get the sandbox ID.
    pub fn id(&self) -> SandboxId {
        self.store.data().id
    }

    /// Get a reference to the engine.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Access the user state.
    pub fn state(&self) -> &S {
        &self.store.data().user_state
    }

    /// Access the user state mutably.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.store.data_mut().user_state
    }

    /// Get the metrics of the most recent call.
    pub fn metrics(&self) -> &SandboxMetrics {
        &self.store.data().metrics
    }

    /// A token that cancels this sandbox's host calls from any thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.store.data().cancel.clone()
    }

    /// Instantiate a validated module, linking it with the registered host
    /// functions.
    pub fn load_module(&mut self, module: &ValidatedModule) -> ExecutionResult<()> {
        debug!(
            sandbox_id = %self.id(),
            module_name = ?module.name(),
            "Loading module into sandbox"
        );

        let instance = self.linker.instantiate(&mut self.store, module.inner())?;

        self.instance = Some(instance);
        self.module = Some(module.clone());

        info!(
            sandbox_id = %self.id(),
            module_name = ?module.name(),
            "Module loaded successfully"
        );

        Ok(())
    }

    /// Check if a module is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.instance.is_some()
    }

    /// Get the loaded module.
    pub fn loaded_module(&self) -> Option<&ValidatedModule> {
        self.module.as_ref()
    }

    /// Call an exported function with no arguments and no return value.
    pub fn call_void(&mut self, name: &str) -> ExecutionResult<()> {
        self.call::<(), ()>(name, ())
    }

    /// Call an exported function with static types.
    pub fn call<P, R>(&mut self, name: &str, params: P) -> ExecutionResult<R>
    where
        P: wasmtime::WasmParams,
        R: wasmtime::WasmResults,
    {
        let instance = self.instance.ok_or(ExecutionError::ModuleNotLoaded)?;

        let func = instance
            .get_typed_func::<P, R>(&mut self.store, name)
            .map_err(|_| ExecutionError::FunctionNotFound(name.to_string()))?;

        let initial_fuel = self.begin_call(name)?;
        let result = func.call(&mut self.store, params);
        self.end_call(initial_fuel);

        result.map_err(|err| self.classify_error(name, err)).inspect(|_| {
            info!(
                sandbox_id = %self.id(),
                function = name,
                duration = ?self.store.data().metrics.duration(),
                host_calls = self.store.data().metrics.host_calls,
                "Function call completed successfully"
            );
        })
    }

    /// Call an exported function with dynamic typing.
    ///
    /// Used where signatures are only known at runtime, such as the CLI.
    pub fn call_dynamic(&mut self, name: &str, params: &[Val]) -> ExecutionResult<Vec<Val>> {
        let instance = self.instance.ok_or(ExecutionError::ModuleNotLoaded)?;

        let func = instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| ExecutionError::FunctionNotFound(name.to_string()))?;

        let result_count = func.ty(&self.store).results().len();
        let mut results = vec![Val::I32(0); result_count];

        let initial_fuel = self.begin_call(name)?;
        let result = func.call(&mut self.store, params, &mut results);
        self.end_call(initial_fuel);

        match result {
            Ok(()) => {
                info!(
                    sandbox_id = %self.id(),
                    function = name,
                    host_calls = self.store.data().metrics.host_calls,
                    "Function call completed successfully"
                );
                Ok(results)
            }
            Err(err) => Err(self.classify_error(name, err)),
        }
    }

    /// Copy `len` bytes out of the guest's linear memory.
    pub fn read_memory(&mut self, offset: usize, len: usize) -> ExecutionResult<Vec<u8>> {
        let memory = self.memory()?;
        let data = memory.data(&self.store);

        let end = offset
            .checked_add(len)
            .filter(|end| *end <= data.len())
            .ok_or(ExecutionError::MemoryOutOfBounds {
                offset,
                len,
                memory_size: data.len(),
            })?;

        Ok(data[offset..end].to_vec())
    }

    /// Copy `bytes` into the guest's linear memory at `offset`.
    pub fn write_memory(&mut self, offset: usize, bytes: &[u8]) -> ExecutionResult<()> {
        let memory = self.memory()?;
        let memory_size = memory.data_size(&self.store);

        memory
            .write(&mut self.store, offset, bytes)
            .map_err(|_| ExecutionError::MemoryOutOfBounds {
                offset,
                len: bytes.len(),
                memory_size,
            })
    }

    /// Get the remaining fuel.
    pub fn remaining_fuel(&self) -> Option<u64> {
        if self.engine.fuel_enabled() {
            self.store.get_fuel().ok()
        } else {
            None
        }
    }

    /// Drop the current instance, reset metrics and fuel, and issue a fresh
    /// cancel token. Registered host functions are kept.
    pub fn reset(&mut self) {
        self.instance = None;
        self.module = None;

        let data = self.store.data_mut();
        data.metrics = SandboxMetrics::default();
        data.cancel = CancelToken::new();
        data.call_deadline = None;

        if self.engine.fuel_enabled() {
            let initial = self.store.data().config.limits.initial_fuel;
            if let Err(err) = self.store.set_fuel(initial) {
                warn!(sandbox_id = %self.id(), error = %err, "Failed to refill fuel");
            }
        }

        debug!(sandbox_id = %self.id(), "Sandbox reset");
    }

    fn memory(&mut self) -> ExecutionResult<Memory> {
        let instance = self.instance.ok_or(ExecutionError::ModuleNotLoaded)?;
        instance
            .get_memory(&mut self.store, MEMORY_EXPORT)
            .ok_or(ExecutionError::MemoryNotExported)
    }

    /// Stamp the call deadline and reset per-call metrics. Returns the fuel
    /// level at call start.
    fn begin_call(&mut self, name: &str) -> ExecutionResult<u64> {
        if self.store.data().cancel.is_cancelled() {
            warn!(sandbox_id = %self.id(), function = name, "Call cancelled before start");
            return Err(ExecutionError::Cancelled);
        }

        let timeout = self.store.data().config.limits.timeout;
        if self.engine.epoch_enabled() {
            self.store
                .set_epoch_deadline(self.engine.config().ticks_for(timeout));
        }

        let now = Instant::now();
        let data = self.store.data_mut();
        data.call_deadline = Some(now + timeout);
        data.metrics.host_calls = 0;
        data.metrics.end_time = None;
        data.metrics.start_time = data.config.collect_metrics.then_some(now);

        debug!(sandbox_id = %self.id(), function = name, "Calling function");

        Ok(self.remaining_fuel().unwrap_or(0))
    }

    fn end_call(&mut self, initial_fuel: u64) {
        let remaining = self.remaining_fuel();
        let data = self.store.data_mut();
        data.call_deadline = None;

        if data.config.collect_metrics {
            data.metrics.end_time = Some(Instant::now());
            if let Some(remaining) = remaining {
                data.metrics.fuel_consumed = initial_fuel.saturating_sub(remaining);
            }
        }
    }

    fn classify_error(&self, name: &str, err: wasmtime::Error) -> ExecutionError {
        let data = self.store.data();

        match err.downcast_ref::<Trap>() {
            Some(Trap::OutOfFuel) => {
                warn!(sandbox_id = %self.id(), function = name, "Out of fuel");
                ExecutionError::OutOfFuel {
                    consumed: data.metrics.fuel_consumed,
                    limit: data.config.limits.initial_fuel,
                }
            }
            Some(Trap::Interrupt) => {
                warn!(sandbox_id = %self.id(), function = name, "Execution timeout");
                ExecutionError::Timeout(data.config.limits.timeout)
            }
            _ => {
                let info = TrapInfo::from_error(&err);
                warn!(
                    sandbox_id = %self.id(),
                    function = name,
                    trap = %info,
                    "Function trapped"
                );
                ExecutionError::Trap(info)
            }
        }
    }
}

impl<S: Send + 'static> std::fmt::Debug for Sandbox<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("id", &self.id())
            .field("loaded", &self.is_loaded())
            .field("metrics", self.metrics())
            .finish()
    }
}

/// Builder for creating sandboxes with custom configuration.
pub struct SandboxBuilder<S = ()> {
    engine: SharedEngine,
    user_state: Option<S>,
    config: SandboxConfig,
    linker: Option<Linker<SandboxData<S>>>,
}

impl<S: Send + 'static> SandboxBuilder<S> {
    /// Create a new sandbox builder.
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
            user_state: None,
            config: SandboxConfig::default(),
            linker: None,
        }
    }

    /// Set the user state.
    pub fn with_state(mut self, state: S) -> Self {
        self.user_state = Some(state);
        self
    }

    /// Set the sandbox configuration.
    pub fn with_config(mut self, config: SandboxConfig) -> Self {
        self.config = config;
        self
    }

    /// Set resource limits.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Set the memory limit.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.config.limits.max_memory_bytes = bytes;
        self
    }

    /// Set the fuel limit.
    pub fn with_fuel_limit(mut self, fuel: u64) -> Self {
        self.config.limits.initial_fuel = fuel;
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.limits.timeout = timeout;
        self
    }

    /// Use a linker that already carries host functions.
    pub fn with_linker(mut self, linker: Linker<SandboxData<S>>) -> Self {
        self.linker = Some(linker);
        self
    }

    /// Build the sandbox.
    pub fn build(mut self) -> ExecutionResult<Sandbox<S>>
    where
        S: Default,
    {
        let state = self.user_state.take().unwrap_or_default();
        self.build_with_state(state)
    }

    /// Build the sandbox with the provided state.
    pub fn build_with_state(self, state: S) -> ExecutionResult<Sandbox<S>> {
        let linker = self
            .linker
            .unwrap_or_else(|| Linker::new(self.engine.inner()));
        Sandbox::with_linker(self.engine, state, self.config, linker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::{IntoShared, TetherEngine};
    use crate::module::ModuleLoader;
    use wasmtime::Caller;

    fn create_engine() -> SharedEngine {
        TetherEngine::new(EngineConfig::default())
            .unwrap()
            .into_shared()
    }

    fn load(engine: &SharedEngine, wat: &str) -> ValidatedModule {
        ModuleLoader::new(Arc::clone(engine)).load_wat(wat).unwrap()
    }

    #[test]
    fn test_sandbox_builder() {
        let engine = create_engine();
        let sandbox = SandboxBuilder::<()>::new(engine)
            .with_memory_limit(1024 * 1024)
            .with_fuel_limit(10_000)
            .with_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert!(!sandbox.is_loaded());
    }

    #[test]
    fn test_builder_state() {
        let sandbox = SandboxBuilder::new(create_engine())
            .with_state(String::from("tenant-a"))
            .build()
            .unwrap();

        assert_eq!(sandbox.state(), "tenant-a");
    }

    #[test]
    fn test_load_and_call() {
        let engine = create_engine();
        let module = load(
            &engine,
            r#"
            (module
                (func (export "add") (param i32 i32) (result i32)
                    local.get 0
                    local.get 1
                    i32.add
                )
            )
        "#,
        );

        let mut sandbox = Sandbox::<()>::new(engine, (), SandboxConfig::default()).unwrap();
        sandbox.load_module(&module).unwrap();

        let result: i32 = sandbox.call("add", (2i32, 3i32)).unwrap();
        assert_eq!(result, 5);

        let dynamic = sandbox
            .call_dynamic("add", &[Val::I32(4), Val::I32(5)])
            .unwrap();
        assert_eq!(dynamic[0].i32(), Some(9));
    }

    #[test]
    fn test_out_of_fuel() {
        let engine = create_engine();
        let module = load(
            &engine,
            r#"(module (func (export "infinite") (loop $loop (br $loop))))"#,
        );

        let mut sandbox = SandboxBuilder::<()>::new(engine)
            .with_fuel_limit(1000)
            .build()
            .unwrap();
        sandbox.load_module(&module).unwrap();

        let result = sandbox.call::<(), ()>("infinite", ());
        assert!(matches!(result, Err(ExecutionError::OutOfFuel { .. })));
    }

    #[test]
    fn test_epoch_timeout() {
        let config = EngineConfig::default()
            .with_fuel(false)
            .with_epoch_interval(Duration::from_millis(1));
        let engine = TetherEngine::new(config).unwrap().into_shared();
        let _ticker = engine.start_epoch_ticker().unwrap();

        let module = load(
            &engine,
            r#"(module (func (export "infinite") (loop $loop (br $loop))))"#,
        );

        let mut sandbox = SandboxBuilder::<()>::new(engine)
            .with_timeout(Duration::from_millis(20))
            .build()
            .unwrap();
        sandbox.load_module(&module).unwrap();

        let result = sandbox.call::<(), ()>("infinite", ());
        assert!(matches!(result, Err(ExecutionError::Timeout(_))));
    }

    #[test]
    fn test_function_not_found() {
        let engine = create_engine();
        let module = load(&engine, r#"(module (func (export "exists")))"#);

        let mut sandbox = Sandbox::<()>::new(engine, (), SandboxConfig::default()).unwrap();
        sandbox.load_module(&module).unwrap();

        let result = sandbox.call::<(), ()>("does_not_exist", ());
        assert!(matches!(result, Err(ExecutionError::FunctionNotFound(_))));
    }

    #[test]
    fn test_memory_read_write() {
        let engine = create_engine();
        let module = load(&engine, r#"(module (memory (export "memory") 1))"#);

        let mut sandbox = Sandbox::<()>::new(engine, (), SandboxConfig::default()).unwrap();
        sandbox.load_module(&module).unwrap();

        sandbox.write_memory(16, b"hello").unwrap();
        assert_eq!(sandbox.read_memory(16, 5).unwrap(), b"hello");

        assert!(matches!(
            sandbox.read_memory(65_530, 10),
            Err(ExecutionError::MemoryOutOfBounds { .. })
        ));
        assert!(matches!(
            sandbox.write_memory(65_535, b"xy"),
            Err(ExecutionError::MemoryOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_memory_not_exported() {
        let engine = create_engine();
        let module = load(&engine, r#"(module (memory 1))"#);

        let mut sandbox = Sandbox::<()>::new(engine, (), SandboxConfig::default()).unwrap();
        sandbox.load_module(&module).unwrap();

        assert!(matches!(
            sandbox.read_memory(0, 1),
            Err(ExecutionError::MemoryNotExported)
        ));
    }

    #[test]
    fn test_host_function_sees_deadline_and_counts_calls() {
        let engine = create_engine();
        let mut linker: Linker<SandboxData<Vec<bool>>> = Linker::new(engine.inner());
        linker
            .func_wrap("env", "record_deadline", |mut caller: Caller<'_, SandboxData<Vec<bool>>>| {
                let data = caller.data_mut();
                data.record_host_call();
                let has_deadline = data.call_deadline().is_some();
                data.state_mut().push(has_deadline);
            })
            .unwrap();

        let module = load(
            &engine,
            r#"
            (module
                (import "env" "record_deadline" (func $record_deadline))
                (func (export "main") call $record_deadline call $record_deadline)
            )
        "#,
        );

        let mut sandbox = SandboxBuilder::new(engine)
            .with_linker(linker)
            .build_with_state(Vec::new())
            .unwrap();
        sandbox.load_module(&module).unwrap();
        sandbox.call_void("main").unwrap();

        assert_eq!(sandbox.state(), &vec![true, true]);
        assert_eq!(sandbox.metrics().host_calls, 2);
    }

    #[test]
    fn test_host_error_becomes_trap() {
        let engine = create_engine();
        let mut linker: Linker<SandboxData<()>> = Linker::new(engine.inner());
        linker
            .func_wrap(
                "env",
                "fail",
                |_caller: Caller<'_, SandboxData<()>>| -> wasmtime::Result<()> {
                    Err(wasmtime::Error::msg("guest passed a bad region"))
                },
            )
            .unwrap();

        let module = load(
            &engine,
            r#"
            (module
                (import "env" "fail" (func $fail))
                (func (export "main") call $fail)
            )
        "#,
        );

        let mut sandbox = SandboxBuilder::<()>::new(engine)
            .with_linker(linker)
            .build()
            .unwrap();
        sandbox.load_module(&module).unwrap();

        match sandbox.call_void("main") {
            Err(ExecutionError::Trap(info)) => assert!(info.message.contains("bad region")),
            other => panic!("expected trap, got {:?}", other),
        }
    }

    #[test]
    fn test_cancel_before_call() {
        let engine = create_engine();
        let module = load(&engine, r#"(module (func (export "noop")))"#);

        let mut sandbox = SandboxBuilder::<()>::new(engine).build().unwrap();
        sandbox.load_module(&module).unwrap();

        let token = sandbox.cancel_token();
        token.cancel();
        assert!(matches!(
            sandbox.call_void("noop"),
            Err(ExecutionError::Cancelled)
        ));

        sandbox.reset();
        sandbox.load_module(&module).unwrap();
        assert!(sandbox.call_void("noop").is_ok());
        assert!(token.is_cancelled());
        assert!(!sandbox.cancel_token().is_cancelled());
    }

    #[test]
    fn test_sandbox_reset_refills_fuel() {
        let engine = create_engine();
        let module = load(&engine, r#"(module (func (export "noop")))"#);

        let mut sandbox = SandboxBuilder::<()>::new(engine)
            .with_fuel_limit(1_000_000)
            .build()
            .unwrap();

        sandbox.load_module(&module).unwrap();
        sandbox.call_void("noop").unwrap();
        let fuel_after_call = sandbox.remaining_fuel().unwrap();

        sandbox.reset();

        assert!(!sandbox.is_loaded());
        assert!(sandbox.remaining_fuel().unwrap() > fuel_after_call);
    }

    #[test]
    fn test_metrics_can_be_disabled() {
        let engine = create_engine();
        let module = load(&engine, r#"(module (func (export "noop")))"#);

        let config = SandboxConfig::new().with_metrics(false);
        let mut sandbox = Sandbox::<()>::new(engine, (), config).unwrap();
        sandbox.load_module(&module).unwrap();
        sandbox.call_void("noop").unwrap();

        assert!(sandbox.metrics().duration().is_none());
        assert_eq!(sandbox.metrics().fuel_consumed, 0);
    }
}
