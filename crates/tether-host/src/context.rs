//! Host function execution context.
//!
//! [`HostContext`] pairs a wasmtime [`Caller`] with the guest's exported
//! memory, so the accessors in [`crate::memory`] can run against a live
//! instance exactly as they run against a [`FlatMemory`](crate::FlatMemory).

use tether_core::{MEMORY_EXPORT, SandboxData};
use wasmtime::{Caller, Memory};

use crate::dispatch::CallScope;
use crate::error::{HostError, HostResult};
use crate::memory::GuestMemory;

/// Store data the bridge's host functions can work with.
pub trait HostState {
    /// Time and cancellation bounds of the running guest call.
    fn call_scope(&self) -> CallScope;

    /// Count one host function invocation.
    fn record_host_call(&mut self);
}

impl<S> HostState for SandboxData<S> {
    fn call_scope(&self) -> CallScope {
        CallScope {
            deadline: self.call_deadline(),
            cancel: Some(self.cancel_token().clone()),
        }
    }

    fn record_host_call(&mut self) {
        SandboxData::record_host_call(self);
    }
}

/// Context available to host function implementations.
pub struct HostContext<'a, T> {
    caller: Caller<'a, T>,
    memory: Memory,
}

impl<'a, T> HostContext<'a, T> {
    /// Wrap `caller`, resolving the guest's `memory` export.
    pub fn new(mut caller: Caller<'a, T>) -> HostResult<Self> {
        let memory = caller
            .get_export(MEMORY_EXPORT)
            .and_then(|export| export.into_memory())
            .ok_or(HostError::MemoryNotFound)?;

        Ok(Self { caller, memory })
    }

    /// Access the store data.
    pub fn state(&self) -> &T {
        self.caller.data()
    }

    /// Access the store data mutably.
    pub fn state_mut(&mut self) -> &mut T {
        self.caller.data_mut()
    }

    /// Get a reference to the underlying Wasmtime caller.
    pub fn caller(&self) -> &Caller<'a, T> {
        &self.caller
    }
}

impl<T> GuestMemory for HostContext<'_, T> {
    fn data(&self) -> &[u8] {
        self.memory.data(&self.caller)
    }

    fn data_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut(&mut self.caller)
    }
}

impl<T> std::fmt::Debug for HostContext<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("memory_size", &self.data().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{self, GuestRegion, OverflowPolicy, ReturnBuffer};
    use wasmtime::{Engine, Instance, Linker, Module, Store};

    const ECHO_WAT: &str = r#"
        (module
            (import "env" "echo" (func $echo (param i32 i32 i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "ping")
            (func (export "run")
                (call $echo (i32.const 0) (i32.const 4) (i32.const 64) (i32.const 16))
            )
        )
    "#;

    #[test]
    fn test_context_reads_and_writes_guest_memory() {
        let engine = Engine::default();
        let module = Module::new(&engine, wat::parse_str(ECHO_WAT).unwrap()).unwrap();
        let mut linker = Linker::<Vec<String>>::new(&engine);
        linker
            .func_wrap(
                "env",
                "echo",
                |caller: Caller<'_, Vec<String>>,
                 off: u32,
                 len: u32,
                 ret: u32,
                 cap: u32|
                 -> wasmtime::Result<()> {
                    let mut ctx = HostContext::new(caller)?;
                    let text = memory::read_string(&ctx, GuestRegion::new(off, len))?;
                    let reply = format!("{}-pong", text);
                    memory::write_string(
                        &mut ctx,
                        &reply,
                        ReturnBuffer::new(ret, cap),
                        OverflowPolicy::Truncate,
                    )?;
                    ctx.state_mut().push(text);
                    Ok(())
                },
            )
            .unwrap();

        let mut store = Store::new(&engine, Vec::new());
        let instance = linker.instantiate(&mut store, &module).unwrap();
        instance
            .get_typed_func::<(), ()>(&mut store, "run")
            .unwrap()
            .call(&mut store, ())
            .unwrap();

        assert_eq!(store.data(), &vec!["ping".to_string()]);
        let memory = instance.get_memory(&mut store, "memory").unwrap();
        assert_eq!(&memory.data(&store)[64..74], b"ping-pong\0");
    }

    #[test]
    fn test_missing_memory_export() {
        let engine = Engine::default();
        let wat = r#"
            (module
                (import "env" "touch_memory" (func $touch_memory))
                (func (export "run") (call $touch_memory))
            )
        "#;
        let module = Module::new(&engine, wat::parse_str(wat).unwrap()).unwrap();
        let mut store = Store::new(&engine, ());
        let touch_memory =
            wasmtime::Func::wrap(&mut store, |caller: Caller<'_, ()>| -> wasmtime::Result<()> {
                HostContext::new(caller)?;
                Ok(())
            });
        let instance = Instance::new(&mut store, &module, &[touch_memory.into()]).unwrap();

        let err = instance
            .get_typed_func::<(), ()>(&mut store, "run")
            .unwrap()
            .call(&mut store, ())
            .unwrap_err();

        assert!(err.downcast_ref::<HostError>().is_some());
    }
}
