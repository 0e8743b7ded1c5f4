//! Calls from the guest into the host's `env` functions.

use tether_codec::{Failure, FailureKind, Headers, WireFormat};

use crate::raw::until_nul;

/// Size of the buffer each HTTP call hands the host for its result.
pub const HTTP_RESULT_CAPACITY: usize = 64 * 1024;

/// Size of the buffer used for an environment variable's value.
pub const ENV_VALUE_CAPACITY: usize = 4 * 1024;

#[link(wasm_import_module = "env")]
unsafe extern "C" {
    fn host_http(
        url_off: u32,
        url_len: u32,
        method_off: u32,
        method_len: u32,
        headers_off: u32,
        headers_len: u32,
        body_off: u32,
        body_len: u32,
        ret_ptr: u32,
        ret_cap: u32,
    );

    fn host_get_env(name_off: u32, name_len: u32, ret_ptr: u32, ret_cap: u32) -> i32;
}

fn region(text: &str) -> (u32, u32) {
    (text.as_ptr() as u32, text.len() as u32)
}

/// Perform an HTTP request through the host, in the delimited format.
///
/// A response body longer than [`HTTP_RESULT_CAPACITY`] arrives cut short.
pub fn http(method: &str, url: &str, headers: &Headers, body: &str) -> Result<String, Failure> {
    http_with_format(WireFormat::Delimited, method, url, headers, body)
}

/// Perform an HTTP request through the host in `format`, which must match
/// the host's `wire_format`.
pub fn http_with_format(
    format: WireFormat,
    method: &str,
    url: &str,
    headers: &Headers,
    body: &str,
) -> Result<String, Failure> {
    let blob = format
        .encode_headers(headers)
        .map_err(|e| Failure::new(FailureKind::Encoding, e.to_string()))?;

    let (url_off, url_len) = region(url);
    let (method_off, method_len) = region(method);
    let (headers_off, headers_len) = region(&blob);
    let (body_off, body_len) = region(body);
    let mut ret = vec![0u8; HTTP_RESULT_CAPACITY];

    // SAFETY: every region points into a live allocation of this instance.
    unsafe {
        host_http(
            url_off,
            url_len,
            method_off,
            method_len,
            headers_off,
            headers_len,
            body_off,
            body_len,
            ret.as_mut_ptr() as u32,
            ret.len() as u32,
        );
    }

    let text = String::from_utf8_lossy(until_nul(&ret));
    format
        .decode_outcome(&text)
        .map_err(|e| Failure::new(FailureKind::Encoding, e.to_string()))?
        .into_result()
}

/// Read a variable the host provides to this guest.
pub fn get_env(name: &str) -> Option<String> {
    let (name_off, name_len) = region(name);
    let mut ret = vec![0u8; ENV_VALUE_CAPACITY];

    // SAFETY: both regions point into live allocations of this instance.
    let written =
        unsafe { host_get_env(name_off, name_len, ret.as_mut_ptr() as u32, ret.len() as u32) };

    let written = usize::try_from(written).ok()?;
    ret.truncate(written.min(ENV_VALUE_CAPACITY));
    Some(String::from_utf8_lossy(&ret).into_owned())
}
