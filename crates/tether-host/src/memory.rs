//! Byte-level access to a guest's linear memory.
//!
//! Guests pass every value as an `(offset, len)` pair and receive results in
//! a buffer they allocated themselves. The functions here are the only place
//! those numbers are turned into slices, and they bounds-check with `u32`
//! overflow treated as out of bounds.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HostError, HostResult};

/// Linear memory a host function can read and write.
pub trait GuestMemory {
    /// The whole memory.
    fn data(&self) -> &[u8];

    /// The whole memory, mutably.
    fn data_mut(&mut self) -> &mut [u8];
}

/// A byte span supplied by the guest for one host call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuestRegion {
    /// Start of the span.
    pub offset: u32,
    /// Length of the span.
    pub len: u32,
}

impl GuestRegion {
    /// Create a region.
    pub fn new(offset: u32, len: u32) -> Self {
        Self { offset, len }
    }

    fn range(self, memory_size: usize) -> HostResult<Range<usize>> {
        checked_range(self.offset, self.len, memory_size)
    }
}

/// Guest-allocated region that receives a host call's result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReturnBuffer {
    /// Start of the buffer.
    pub ptr: u32,
    /// Size of the buffer; the host never writes past it.
    pub capacity: u32,
}

impl ReturnBuffer {
    /// Create a return buffer.
    pub fn new(ptr: u32, capacity: u32) -> Self {
        Self { ptr, capacity }
    }

    fn range(self, memory_size: usize) -> HostResult<Range<usize>> {
        checked_range(self.ptr, self.capacity, memory_size)
    }
}

fn checked_range(offset: u32, len: u32, memory_size: usize) -> HostResult<Range<usize>> {
    offset
        .checked_add(len)
        .map(|end| end as usize)
        .filter(|end| *end <= memory_size)
        .map(|end| offset as usize..end)
        .ok_or(HostError::MemoryAccessOutOfBounds {
            offset,
            len,
            memory_size,
        })
}

/// What to do when a result is longer than the guest's return buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Write the longest prefix that fits and ends on a character boundary.
    #[default]
    Truncate,
    /// Write nothing and trap with [`HostError::ReturnBufferOverflow`].
    Reject,
}

/// Read a UTF-8 string from guest memory.
pub fn read_string<M: GuestMemory + ?Sized>(memory: &M, region: GuestRegion) -> HostResult<String> {
    let data = memory.data();
    let bytes = &data[region.range(data.len())?];

    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| HostError::InvalidUtf8 {
            offset: region.offset,
            reason: e.to_string(),
        })
}

/// Write `text` into the guest's return buffer.
///
/// When fewer than `capacity` bytes are written, a NUL byte follows them so
/// the guest can find the end. Returns the number of text bytes written.
pub fn write_string<M: GuestMemory + ?Sized>(
    memory: &mut M,
    text: &str,
    buffer: ReturnBuffer,
    policy: OverflowPolicy,
) -> HostResult<usize> {
    let range = buffer.range(memory.data().len())?;
    let capacity = range.len();
    let bytes = text.as_bytes();

    let written = if bytes.len() <= capacity {
        bytes.len()
    } else {
        match policy {
            OverflowPolicy::Truncate => {
                let cut = floor_char_boundary(text, capacity);
                debug!(
                    required = bytes.len(),
                    capacity,
                    written = cut,
                    "Truncating result to fit return buffer"
                );
                cut
            }
            OverflowPolicy::Reject => {
                return Err(HostError::ReturnBufferOverflow {
                    required: bytes.len(),
                    capacity,
                });
            }
        }
    };

    let dest = &mut memory.data_mut()[range];
    dest[..written].copy_from_slice(&bytes[..written]);
    if written < capacity {
        dest[written] = 0;
    }

    Ok(written)
}

/// Read back a result written by [`write_string`]: bytes up to the first NUL
/// or the end of the buffer.
pub fn read_terminated<M: GuestMemory + ?Sized>(
    memory: &M,
    buffer: ReturnBuffer,
) -> HostResult<String> {
    let data = memory.data();
    let bytes = &data[buffer.range(data.len())?];
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());

    std::str::from_utf8(&bytes[..end])
        .map(str::to_owned)
        .map_err(|e| HostError::InvalidUtf8 {
            offset: buffer.ptr,
            reason: e.to_string(),
        })
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    (0..=index.min(text.len()))
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0)
}

/// Guest memory backed by a plain vector.
///
/// Used to drive host functions without a wasm instance: values are placed
/// one after another, the way a bump allocator in the guest would. Offsets
/// saturate at `u32::MAX`, so anything placed past 4GiB fails bounds checks.
#[derive(Debug, Clone, Default)]
pub struct FlatMemory {
    bytes: Vec<u8>,
}

impl FlatMemory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zeroed memory of `size` bytes.
    pub fn with_size(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// Append `bytes` and return the region holding them.
    pub fn place(&mut self, bytes: &[u8]) -> GuestRegion {
        let offset = self.end_offset();
        self.bytes.extend_from_slice(bytes);
        GuestRegion::new(offset, saturating_u32(bytes.len()))
    }

    /// Append a zeroed buffer of `capacity` bytes.
    pub fn reserve(&mut self, capacity: u32) -> ReturnBuffer {
        let ptr = self.end_offset();
        self.bytes.resize(self.bytes.len() + capacity as usize, 0);
        ReturnBuffer::new(ptr, capacity)
    }

    /// Current size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been placed yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn end_offset(&self) -> u32 {
        saturating_u32(self.bytes.len())
    }
}

fn saturating_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl GuestMemory for FlatMemory {
    fn data(&self) -> &[u8] {
        &self.bytes
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
