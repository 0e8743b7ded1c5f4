//! Tether Core - WebAssembly runtime scaffolding
//!
//! The pieces every Tether host needs before a host function can run:
//!
//! - [`TetherEngine`]: wraps Wasmtime, owns the epoch counter
//! - [`ModuleLoader`]: compiles and inspects guest modules
//! - [`Sandbox`]: one store, one instance, bounded calls
//!
//! Each call into a guest is bounded by fuel, store limits and a wall-clock
//! deadline. The deadline and the sandbox's [`CancelToken`] are exposed to
//! host functions through [`SandboxData`], so a host call that blocks on I/O
//! can give up in time.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tether_core::prelude::*;
//!
//! let engine = TetherEngine::default_engine().unwrap().into_shared();
//! let module = ModuleLoader::new(Arc::clone(&engine))
//!     .load_wat(r#"(module (func (export "add") (param i32 i32) (result i32)
//!         local.get 0 local.get 1 i32.add))"#)
//!     .unwrap();
//!
//! let mut sandbox = SandboxBuilder::<()>::new(engine)
//!     .with_fuel_limit(1_000_000)
//!     .build()
//!     .unwrap();
//!
//! sandbox.load_module(&module).unwrap();
//! let result: i32 = sandbox.call("add", (2i32, 3i32)).unwrap();
//! assert_eq!(result, 5);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod module;
pub mod sandbox;

pub use config::{EngineConfig, ResourceLimits, SandboxConfig};
pub use engine::{EpochTicker, IntoShared, SharedEngine, TetherEngine};
pub use error::{
    EngineError, ExecutionError, ExecutionResult, ModuleError, ModuleResult, Result,
    TetherError, TrapInfo,
};
pub use module::{
    ExportInfo, ExportKind, ImportInfo, ImportKind, MemoryInfo, ModuleLoader, ModuleMetadata,
    Signature, ValidatedModule,
};
pub use sandbox::{
    CancelToken, MEMORY_EXPORT, Sandbox, SandboxBuilder, SandboxData, SandboxId, SandboxMetrics,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{EngineConfig, ResourceLimits, SandboxConfig};
    pub use crate::engine::{IntoShared, SharedEngine, TetherEngine};
    pub use crate::error::{ExecutionError, ModuleError, Result, TetherError};
    pub use crate::module::{ModuleLoader, ValidatedModule};
    pub use crate::sandbox::{CancelToken, Sandbox, SandboxBuilder, SandboxId};
}
