//! Calling a guest's registered handler.

use tether_codec::abi::{ALLOC_EXPORT, DEALLOC_EXPORT, HANDLE_EXPORT};
use tether_codec::{Headers, Outcome, WireFormat};
use tether_core::Sandbox;
use tracing::{debug, warn};

use crate::{TetherRuntime, TetherRuntimeError};

/// Size of the buffer the guest writes its encoded response into.
pub const HANDLER_RESULT_CAPACITY: u32 = 64 * 1024;

/// A handler's decoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerReply {
    /// Response body.
    pub body: String,
    /// Response headers.
    pub headers: Headers,
}

impl TetherRuntime {
    /// Invoke the guest's `handle` export with a request.
    ///
    /// The guest must export `alloc` and `handle`. When it also exports
    /// `dealloc`, the request and return buffers are released before this
    /// returns, whatever the outcome. A handler error comes back as
    /// [`TetherRuntimeError::HandlerFailed`].
    pub fn invoke_handler<S: Send + 'static>(
        &self,
        sandbox: &mut Sandbox<S>,
        body: &str,
        headers: &Headers,
    ) -> Result<HandlerReply, TetherRuntimeError> {
        let module = sandbox
            .loaded_module()
            .ok_or(TetherRuntimeError::Execution(
                tether_core::ExecutionError::ModuleNotLoaded,
            ))?;
        for export in [ALLOC_EXPORT, HANDLE_EXPORT] {
            if !module.has_export(export) {
                return Err(TetherRuntimeError::MissingExport(export));
            }
        }
        let releases = module.has_export(DEALLOC_EXPORT);

        let format = self.bridge().http().config().wire_format;
        let headers_blob = format
            .encode_headers(headers)
            .map_err(|e| TetherRuntimeError::InvalidRequest(e.to_string()))?;

        let mut allocations = Vec::with_capacity(3);
        let result = call_handler(sandbox, format, body, &headers_blob, &mut allocations);
        if releases {
            release(sandbox, &allocations);
        }
        result
    }
}

fn call_handler<S: Send + 'static>(
    sandbox: &mut Sandbox<S>,
    format: WireFormat,
    body: &str,
    headers_blob: &str,
    allocations: &mut Vec<(u32, u32)>,
) -> Result<HandlerReply, TetherRuntimeError> {
    let (body_off, body_len) = place(sandbox, body.as_bytes(), allocations)?;
    let (headers_off, headers_len) = place(sandbox, headers_blob.as_bytes(), allocations)?;
    let ret_ptr: u32 = sandbox.call(ALLOC_EXPORT, HANDLER_RESULT_CAPACITY)?;
    allocations.push((ret_ptr, HANDLER_RESULT_CAPACITY));

    let len: i32 = sandbox.call(
        HANDLE_EXPORT,
        (
            body_off,
            body_len,
            headers_off,
            headers_len,
            ret_ptr,
            HANDLER_RESULT_CAPACITY,
        ),
    )?;

    let len = usize::try_from(len)
        .map_err(|_| TetherRuntimeError::MalformedResponse(format!("negative length {len}")))?;
    let capacity = HANDLER_RESULT_CAPACITY as usize;
    if len > capacity {
        warn!(len, capacity, "Handler response truncated");
        return Err(TetherRuntimeError::ResponseTooLarge { len, capacity });
    }

    let bytes = sandbox.read_memory(ret_ptr as usize, len)?;
    let text = String::from_utf8(bytes)
        .map_err(|e| TetherRuntimeError::MalformedResponse(e.to_string()))?;
    debug!(len, "Handler returned");

    decode_reply(format, &text)
}

/// Decode a handler's encoded result in the runtime's wire format.
pub(crate) fn decode_reply(
    format: WireFormat,
    text: &str,
) -> Result<HandlerReply, TetherRuntimeError> {
    if let Ok((body, headers)) = format.decode_response(text) {
        return Ok(HandlerReply { body, headers });
    }

    match format.decode_outcome(text) {
        Ok(Outcome::Failure(failure)) => Err(TetherRuntimeError::HandlerFailed(failure)),
        Ok(Outcome::Success(_)) => Err(TetherRuntimeError::MalformedResponse(
            "response envelope missing".to_string(),
        )),
        Err(e) => Err(TetherRuntimeError::MalformedResponse(e.to_string())),
    }
}

/// Copy `bytes` into guest memory obtained from the guest's allocator.
fn place<S: Send + 'static>(
    sandbox: &mut Sandbox<S>,
    bytes: &[u8],
    allocations: &mut Vec<(u32, u32)>,
) -> Result<(u32, u32), TetherRuntimeError> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        TetherRuntimeError::InvalidRequest(format!(
            "{} byte request does not fit guest memory",
            bytes.len()
        ))
    })?;
    let ptr: u32 = sandbox.call(ALLOC_EXPORT, len)?;
    allocations.push((ptr, len));
    sandbox.write_memory(ptr as usize, bytes)?;
    Ok((ptr, len))
}

/// Hand each region back to the guest's `dealloc`.
fn release<S: Send + 'static>(sandbox: &mut Sandbox<S>, allocations: &[(u32, u32)]) {
    for &(ptr, len) in allocations {
        if let Err(e) = sandbox.call::<(u32, u32), ()>(DEALLOC_EXPORT, (ptr, len)) {
            warn!(ptr, len, error = %e, "Guest dealloc failed");
            return;
        }
    }
}
