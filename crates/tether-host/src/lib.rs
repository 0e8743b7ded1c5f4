//! Tether Host Function Bridge
//!
//! This crate implements the host side of the guest/host boundary. Guests
//! pass plain `(offset, len)` pairs; the bridge reads them out of linear
//! memory, decodes them with [`tether_codec`], runs the capability and writes
//! one encoded result string into a buffer the guest supplied.
//!
//! - [`HttpDispatcher`]: the `host_http` function
//! - [`EnvBridge`]: the `host_get_env` function
//! - [`HostBridge`]: registers both on a [`TetherLinker`]
//! - [`memory`]: bounds-checked reads and capped writes
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tether_host::{
//!     CallScope, FlatMemory, HttpCallArgs, HttpDispatcher, ReqwestBackendFactory, memory,
//! };
//!
//! let dispatcher = HttpDispatcher::new(Arc::new(ReqwestBackendFactory::new()));
//!
//! let mut mem = FlatMemory::new();
//! let args = HttpCallArgs {
//!     url: mem.place(b"https://example.com"),
//!     method: mem.place(b"DELETE"),
//!     headers: mem.place(b""),
//!     body: mem.place(b""),
//!     ret: mem.reserve(64),
//! };
//!
//! dispatcher.handle(&mut mem, &args, &CallScope::unbounded()).unwrap();
//! assert_eq!(
//!     memory::read_terminated(&mem, args.ret).unwrap(),
//!     "[ERR]DELETE is not yet implemented"
//! );
//! ```

pub mod bridge;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod http;
pub mod linker;
pub mod memory;

pub use bridge::HostBridge;
pub use config::{BridgeConfig, HttpConfig};
pub use context::{HostContext, HostState};
pub use dispatch::{CallScope, HttpCallArgs, HttpDispatcher};
pub use env::EnvBridge;
pub use error::{HostError, HostResult, TransportError};
pub use http::{
    BackendFactory, HttpBackend, HttpCall, HttpMethod, ReqwestBackend, ReqwestBackendFactory,
};
pub use linker::{RegisteredFunction, TetherLinker};
pub use memory::{FlatMemory, GuestMemory, GuestRegion, OverflowPolicy, ReturnBuffer};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bridge::HostBridge;
    pub use crate::config::BridgeConfig;
    pub use crate::dispatch::{CallScope, HttpDispatcher};
    pub use crate::env::EnvBridge;
    pub use crate::error::{HostError, HostResult};
    pub use crate::http::{BackendFactory, HttpBackend, ReqwestBackendFactory};
    pub use crate::linker::TetherLinker;
    pub use crate::memory::{GuestMemory, OverflowPolicy};
}
