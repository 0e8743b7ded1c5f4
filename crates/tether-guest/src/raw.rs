//! Byte-level glue behind the guest's exports.
//!
//! The safe helpers here are shared by the `export_handler!` entry points
//! and the host-call wrappers; the pointer-taking functions exist only on
//! `wasm32`, where a `u32` is an address.

/// Bytes before the first NUL, or the whole buffer.
pub fn until_nul(buf: &[u8]) -> &[u8] {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    &buf[..end]
}

/// Copy as much of `text` as fits into `out`, NUL-terminating when a byte is
/// left over. Returns the full length of `text`, so a caller can tell the
/// result was cut when it exceeds `out.len()`.
pub fn write_capped(out: &mut [u8], text: &str) -> i32 {
    let bytes = text.as_bytes();
    let n = bytes.len().min(out.len());
    out[..n].copy_from_slice(&bytes[..n]);
    if n < out.len() {
        out[n] = 0;
    }
    i32::try_from(bytes.len()).unwrap_or(i32::MAX)
}

#[cfg(target_arch = "wasm32")]
mod exports {
    use super::write_capped;
    use crate::handler::{Handler, HandlerAdapter};

    /// Reserve `len` bytes the host may fill, until [`dealloc`] returns them.
    pub fn alloc(len: u32) -> u32 {
        let buf = vec![0u8; len as usize].into_boxed_slice();
        Box::leak(buf).as_mut_ptr() as u32
    }

    /// Free a region handed out by [`alloc`].
    ///
    /// # Safety
    ///
    /// `ptr` and `len` must come from one earlier `alloc(len)` call, and the
    /// region must not be freed twice.
    pub unsafe fn dealloc(ptr: u32, len: u32) {
        let slice = core::ptr::slice_from_raw_parts_mut(ptr as *mut u8, len as usize);
        // SAFETY: the caller guarantees this is a leaked `Box<[u8]>` of `len` bytes.
        drop(unsafe { Box::from_raw(slice) });
    }

    /// Decode request strings from memory, run the handler, write the reply.
    ///
    /// # Safety
    ///
    /// Each `(offset, len)` pair must describe memory owned by this instance,
    /// and `ret_ptr..ret_ptr + ret_cap` must be writable.
    pub unsafe fn handle<H: Handler>(
        adapter: &HandlerAdapter<H>,
        body_off: u32,
        body_len: u32,
        headers_off: u32,
        headers_len: u32,
        ret_ptr: u32,
        ret_cap: u32,
    ) -> i32 {
        // SAFETY: the caller guarantees the regions are valid.
        let (body, headers, out) = unsafe {
            (
                core::slice::from_raw_parts(body_off as *const u8, body_len as usize),
                core::slice::from_raw_parts(headers_off as *const u8, headers_len as usize),
                core::slice::from_raw_parts_mut(ret_ptr as *mut u8, ret_cap as usize),
            )
        };

        let result = adapter.invoke(
            &String::from_utf8_lossy(body),
            &String::from_utf8_lossy(headers),
        );
        write_capped(out, &result)
    }
}

#[cfg(target_arch = "wasm32")]
pub use exports::{alloc, dealloc, handle};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_until_nul() {
        assert_eq!(until_nul(b"abc\0def"), b"abc");
        assert_eq!(until_nul(b"abc"), b"abc");
        assert_eq!(until_nul(b""), b"");
    }

    #[test]
    fn test_write_capped_short() {
        let mut out = [0xaa; 6];
        assert_eq!(write_capped(&mut out, "abc"), 3);
        assert_eq!(out, [b'a', b'b', b'c', 0, 0xaa, 0xaa]);
    }

    #[test]
    fn test_write_capped_long() {
        let mut out = [0u8; 4];
        assert_eq!(write_capped(&mut out, "abcdef"), 6);
        assert_eq!(&out, b"abcd");
    }

    proptest! {
        #[test]
        fn prop_write_capped_keeps_prefix(text in "[a-z|:]{0,32}", cap in 0usize..40) {
            let mut out = vec![0xffu8; cap];
            let total = write_capped(&mut out, &text);

            prop_assert_eq!(total as usize, text.len());
            let kept = until_nul(&out);
            let expected = &text.as_bytes()[..text.len().min(cap)];
            prop_assert_eq!(kept, expected);
        }
    }
}
