//! Core error types for Tether.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for Tether core operations.
#[derive(Debug, Error)]
pub enum TetherError {
    /// Error during engine creation or configuration.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Error during module loading or validation.
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// Error during WASM execution.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

/// Errors during engine creation and configuration.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid engine configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Underlying Wasmtime error.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),
}

/// Errors during module loading and validation.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The WASM module is invalid or malformed.
    #[error("Invalid WASM module: {0}")]
    Invalid(String),

    /// IO error reading the module.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required import is missing.
    #[error("Missing import: module='{module}', name='{name}'")]
    MissingImport {
        /// The import module name.
        module: String,
        /// The import name.
        name: String,
    },

    /// Underlying Wasmtime error.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),
}

/// Errors during WASM execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A WASM trap occurred during execution, including host function faults.
    #[error("WASM trap: {0}")]
    Trap(#[from] TrapInfo),

    /// Execution exceeded the timeout limit.
    #[error("Execution timeout after {0:?}")]
    Timeout(Duration),

    /// The call was cancelled before it started.
    #[error("Execution cancelled")]
    Cancelled,

    /// Execution ran out of fuel (CPU limit exceeded).
    #[error("Out of fuel: consumed {consumed}, limit was {limit}")]
    OutOfFuel {
        /// Amount of fuel consumed.
        consumed: u64,
        /// The fuel limit that was set.
        limit: u64,
    },

    /// The requested function was not found in the module.
    #[error("Function not found: '{0}'")]
    FunctionNotFound(String),

    /// The module has not been loaded yet.
    #[error("Module not loaded")]
    ModuleNotLoaded,

    /// The loaded module does not export a linear memory named `memory`.
    #[error("Module does not export memory")]
    MemoryNotExported,

    /// A host-side memory access fell outside the guest's linear memory.
    #[error("Memory access out of bounds: offset={offset}, len={len}, memory_size={memory_size}")]
    MemoryOutOfBounds {
        /// Start of the access.
        offset: usize,
        /// Length of the access.
        len: usize,
        /// Current size of the memory.
        memory_size: usize,
    },

    /// Underlying Wasmtime error.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),
}

/// Information about a WASM trap.
#[derive(Debug, Clone)]
pub struct TrapInfo {
    /// The trap code name, if the trap came from the engine.
    pub code: Option<String>,
    /// Human-readable trap message.
    pub message: String,
}

impl TrapInfo {
    /// Build trap information from an error raised during a call.
    ///
    /// Engine traps keep their code. Errors returned by host functions keep
    /// their full context chain as the message.
    pub fn from_error(err: &wasmtime::Error) -> Self {
        match err.downcast_ref::<wasmtime::Trap>() {
            Some(trap) => Self {
                code: Some(format!("{:?}", trap)),
                message: trap.to_string(),
            },
            None => Self {
                code: None,
                message: format!("{:#}", err),
            },
        }
    }
}

impl std::fmt::Display for TrapInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "[{}] {}", code, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for TrapInfo {}

/// Result type alias for Tether operations.
pub type Result<T> = std::result::Result<T, TetherError>;

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for module operations.
pub type ModuleResult<T> = std::result::Result<T, ModuleError>;

/// Result type alias for execution operations.
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;
