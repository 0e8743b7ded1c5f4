//! Tether Guest Contract
//!
//! The guest side of the bridge. A guest module written in Rust registers one
//! [`Handler`] with [`export_handler!`] and reaches the host through
//! [`host::http`] and [`host::get_env`]. It never sees raw offsets: the
//! macro's exports and the wrappers do the marshaling.
//!
//! ```ignore
//! use tether_guest::{HandlerError, Headers, Response, host};
//!
//! fn hola(_body: String, _headers: Headers) -> Result<Response, HandlerError> {
//!     let message = host::get_env("MESSAGE").unwrap_or_default();
//!     Ok(Response::new(format!("<h1>{message}</h1>"))
//!         .with_header("Content-Type", "text/html; charset=utf-8"))
//! }
//!
//! tether_guest::export_handler!(hola);
//! ```
//!
//! Build guests for `wasm32-unknown-unknown` with `crate-type = ["cdylib"]`.

pub mod handler;
#[cfg(target_arch = "wasm32")]
pub mod host;
pub mod raw;

pub use handler::{Handler, HandlerAdapter, HandlerError, Response};
pub use tether_codec::{Failure, FailureKind, Headers, WireFormat};

/// Export `handle`, `alloc` and `dealloc` for a handler function or closure.
///
/// `handle(body_off, body_len, headers_off, headers_len, ret_ptr, ret_cap)`
/// writes the encoded response into the return buffer and returns its full
/// length. The handler speaks the delimited format unless a [`WireFormat`]
/// is given as a second argument, which must match the host's
/// `wire_format`. The exports are only emitted for `wasm32` targets.
///
/// ```ignore
/// tether_guest::export_handler!(hola, tether_guest::WireFormat::LengthPrefixed);
/// ```
#[macro_export]
macro_rules! export_handler {
    ($handler:expr) => {
        $crate::export_handler!($handler, $crate::WireFormat::Delimited);
    };
    ($handler:expr, $format:expr) => {
        #[cfg(target_arch = "wasm32")]
        #[unsafe(no_mangle)]
        pub extern "C" fn alloc(len: u32) -> u32 {
            $crate::raw::alloc(len)
        }

        #[cfg(target_arch = "wasm32")]
        #[unsafe(no_mangle)]
        pub extern "C" fn dealloc(ptr: u32, len: u32) {
            // SAFETY: the host only returns regions it obtained from `alloc`.
            unsafe { $crate::raw::dealloc(ptr, len) }
        }

        #[cfg(target_arch = "wasm32")]
        #[unsafe(no_mangle)]
        pub extern "C" fn handle(
            body_off: u32,
            body_len: u32,
            headers_off: u32,
            headers_len: u32,
            ret_ptr: u32,
            ret_cap: u32,
        ) -> i32 {
            let adapter = $crate::HandlerAdapter::new($handler).with_wire_format($format);
            // SAFETY: the host passes regions it obtained from `alloc`.
            unsafe {
                $crate::raw::handle(
                    &adapter,
                    body_off,
                    body_len,
                    headers_off,
                    headers_len,
                    ret_ptr,
                    ret_cap,
                )
            }
        }
    };
}
