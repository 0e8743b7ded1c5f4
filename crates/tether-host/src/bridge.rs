//! Registration of the bridge's host functions.

use std::sync::Arc;

use tether_capability::standard_ids;
use tether_codec::abi::{GET_ENV_FUNCTION, HTTP_FUNCTION, IMPORT_MODULE};
use tracing::{debug, warn};
use wasmtime::Caller;

use crate::context::{HostContext, HostState};
use crate::dispatch::{HttpCallArgs, HttpDispatcher};
use crate::env::EnvBridge;
use crate::error::{HostError, HostResult};
use crate::linker::TetherLinker;
use crate::memory::{GuestRegion, ReturnBuffer};

/// The host functions a guest can import from `env`.
#[derive(Debug, Clone)]
pub struct HostBridge {
    http: Arc<HttpDispatcher>,
    env: Arc<EnvBridge>,
}

impl HostBridge {
    /// Create a bridge from its two capabilities.
    pub fn new(http: HttpDispatcher, env: EnvBridge) -> Self {
        Self {
            http: Arc::new(http),
            env: Arc::new(env),
        }
    }

    /// The HTTP dispatcher.
    pub fn http(&self) -> &HttpDispatcher {
        &self.http
    }

    /// The environment bridge.
    pub fn env(&self) -> &EnvBridge {
        &self.env
    }

    /// Register `env.host_http` and `env.host_get_env` on `linker`.
    pub fn register<T: HostState + 'static>(&self, linker: &mut TetherLinker<T>) -> HostResult<()> {
        let http = Arc::clone(&self.http);
        linker.func_wrap_with_capability(
            IMPORT_MODULE,
            HTTP_FUNCTION,
            Some(standard_ids::NETWORK),
            move |caller: Caller<'_, T>,
                  url_off: u32,
                  url_len: u32,
                  method_off: u32,
                  method_len: u32,
                  headers_off: u32,
                  headers_len: u32,
                  body_off: u32,
                  body_len: u32,
                  ret_ptr: u32,
                  ret_cap: u32|
                  -> wasmtime::Result<()> {
                let args = HttpCallArgs {
                    url: GuestRegion::new(url_off, url_len),
                    method: GuestRegion::new(method_off, method_len),
                    headers: GuestRegion::new(headers_off, headers_len),
                    body: GuestRegion::new(body_off, body_len),
                    ret: ReturnBuffer::new(ret_ptr, ret_cap),
                };

                let mut ctx = HostContext::new(caller).map_err(|e| trap(e, HTTP_FUNCTION))?;
                ctx.state_mut().record_host_call();
                let scope = ctx.state().call_scope();

                let written = http
                    .handle(&mut ctx, &args, &scope)
                    .map_err(|e| trap(e, HTTP_FUNCTION))?;
                debug!(written, "host_http returned");
                Ok(())
            },
        )?;

        let env = Arc::clone(&self.env);
        linker.func_wrap_with_capability(
            IMPORT_MODULE,
            GET_ENV_FUNCTION,
            Some(standard_ids::ENV),
            move |caller: Caller<'_, T>,
                  name_off: u32,
                  name_len: u32,
                  ret_ptr: u32,
                  ret_cap: u32|
                  -> wasmtime::Result<i32> {
                let mut ctx = HostContext::new(caller).map_err(|e| trap(e, GET_ENV_FUNCTION))?;
                ctx.state_mut().record_host_call();

                env.handle(
                    &mut ctx,
                    GuestRegion::new(name_off, name_len),
                    ReturnBuffer::new(ret_ptr, ret_cap),
                )
                .map_err(|e| trap(e, GET_ENV_FUNCTION))
            },
        )?;

        Ok(())
    }
}

fn trap(err: HostError, function: &'static str) -> wasmtime::Error {
    warn!(function, error = %err, "Host function trapped");
    wasmtime::Error::new(err).context(function)
}
