//! Names shared by host and guest at the import/export boundary.

/// Import module under which the host exposes its functions.
pub const IMPORT_MODULE: &str = "env";

/// `host_http(url_off, url_len, method_off, method_len, headers_off,
/// headers_len, body_off, body_len, ret_ptr, ret_cap)`.
pub const HTTP_FUNCTION: &str = "host_http";

/// `host_get_env(name_off, name_len, ret_ptr, ret_cap) -> i32`.
pub const GET_ENV_FUNCTION: &str = "host_get_env";

/// Value returned by `host_get_env` when the variable is not available.
pub const ENV_NOT_FOUND: i32 = -1;

/// `handle(body_off, body_len, headers_off, headers_len, ret_ptr, ret_cap) -> i32`.
///
/// The guest writes its encoded response into the return buffer and returns
/// the full encoded length, which exceeds `ret_cap` when the result was cut.
pub const HANDLE_EXPORT: &str = "handle";

/// `alloc(len) -> ptr`, used by the host to place request data in the guest.
pub const ALLOC_EXPORT: &str = "alloc";

/// `dealloc(ptr, len)`, optional. When exported, the host hands back every
/// region it obtained from `alloc` once a handler call is over.
pub const DEALLOC_EXPORT: &str = "dealloc";
