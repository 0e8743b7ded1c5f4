//! Configuration types for the Tether runtime.
//!
//! Engine-wide settings live in [`EngineConfig`]; per-sandbox limits in
//! [`SandboxConfig`] and [`ResourceLimits`].

use std::time::Duration;

/// Configuration for the Tether engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Enable fuel-based CPU limiting.
    ///
    /// WASM execution consumes fuel and traps when it is exhausted.
    pub fuel_enabled: bool,

    /// Enable epoch-based interruption.
    ///
    /// Guest code traps once the engine epoch passes the store's deadline.
    /// The epoch only advances while an [`EpochTicker`](crate::EpochTicker)
    /// is running.
    pub epoch_enabled: bool,

    /// Wall-clock length of one epoch tick.
    ///
    /// Defaults to 10ms.
    pub epoch_interval: Duration,

    /// Maximum WASM stack size in bytes.
    ///
    /// Defaults to 1MB.
    pub max_wasm_stack: usize,

    /// Enable debug information in compiled code.
    pub debug_info: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuel_enabled: true,
            epoch_enabled: true,
            epoch_interval: Duration::from_millis(10),
            max_wasm_stack: 1024 * 1024, // 1MB
            debug_info: false,
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable fuel-based CPU limiting.
    pub fn with_fuel(mut self, enabled: bool) -> Self {
        self.fuel_enabled = enabled;
        self
    }

    /// Enable epoch-based interruption.
    pub fn with_epochs(mut self, enabled: bool) -> Self {
        self.epoch_enabled = enabled;
        self
    }

    /// Set the epoch tick interval.
    pub fn with_epoch_interval(mut self, interval: Duration) -> Self {
        self.epoch_interval = interval;
        self
    }

    /// Set the maximum WASM stack size.
    pub fn with_max_wasm_stack(mut self, bytes: usize) -> Self {
        self.max_wasm_stack = bytes;
        self
    }

    /// Number of epoch ticks that cover `timeout`, at least one.
    pub fn ticks_for(&self, timeout: Duration) -> u64 {
        let interval = self.epoch_interval.as_millis().max(1);
        let ticks = timeout.as_millis().div_ceil(interval);
        u64::try_from(ticks).unwrap_or(u64::MAX).max(1)
    }
}

/// Configuration for sandbox execution.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Resource limits for this sandbox.
    pub limits: ResourceLimits,

    /// Whether to collect timing and fuel metrics for each call.
    pub collect_metrics: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            limits: ResourceLimits::default(),
            collect_metrics: true,
        }
    }
}

impl SandboxConfig {
    /// Create a new sandbox configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set resource limits.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enable or disable metrics collection.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.collect_metrics = enabled;
        self
    }
}

/// Resource limits for sandbox execution.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum memory in bytes.
    ///
    /// Defaults to 64MB.
    pub max_memory_bytes: usize,

    /// Maximum number of memory instances.
    pub max_memories: u32,

    /// Maximum table elements.
    pub max_table_elements: u32,

    /// Initial fuel allocation.
    ///
    /// Defaults to 1 billion units.
    pub initial_fuel: u64,

    /// Wall-clock budget for one guest call, host calls included.
    ///
    /// Defaults to 30 seconds.
    pub timeout: Duration,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 64 * 1024 * 1024, // 64MB
            max_memories: 1,
            max_table_elements: 10_000,
            initial_fuel: 1_000_000_000,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ResourceLimits {
    /// Create resource limits with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial fuel allocation.
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.initial_fuel = fuel;
        self
    }

    /// Set the call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create minimal resource limits for testing.
    pub fn minimal() -> Self {
        Self {
            max_memory_bytes: 1024 * 1024, // 1MB
            max_memories: 1,
            max_table_elements: 1_000,
            initial_fuel: 10_000,
            timeout: Duration::from_secs(1),
        }
    }

    /// Create standard resource limits for typical workloads.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Create generous resource limits for slow upstreams and heavy guests.
    pub fn generous() -> Self {
        Self {
            max_memory_bytes: 256 * 1024 * 1024, // 256MB
            max_memories: 4,
            max_table_elements: 100_000,
            initial_fuel: 10_000_000_000,
            timeout: Duration::from_secs(300),
        }
    }
}
