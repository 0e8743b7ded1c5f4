//! Tether Flat Value Codec
//!
//! Composite values cross the guest boundary as single strings. This crate
//! owns every rendering of those strings:
//!
//! - [`delimited`]: the historical `key:value|key:value` maps and `[ERR]`
//!   tagged failures that existing guest modules expect
//! - [`length_prefixed`]: a self-describing encoding in which separators
//!   carry no meaning inside values
//! - [`Outcome`]: the two-variant result of a capability call, rendered by a
//!   [`WireFormat`] only at the ABI edge
//!
//! # Example
//!
//! ```
//! use tether_codec::{delimited, FailureKind, Outcome, WireFormat};
//!
//! let headers = delimited::decode_map("Accept:application/json|X-Trace:42");
//! assert_eq!(headers["Accept"], "application/json");
//!
//! let outcome = Outcome::failure(FailureKind::Transport, "connection refused");
//! assert_eq!(
//!     WireFormat::Delimited.encode_outcome(&outcome),
//!     "[ERR]connection refused"
//! );
//! ```

pub mod abi;
pub mod delimited;
pub mod error;
pub mod format;
pub mod length_prefixed;
pub mod outcome;

pub use delimited::{decode_error, decode_map, encode_error, is_error};
pub use error::{CodecError, CodecResult};
pub use format::WireFormat;
pub use outcome::{Failure, FailureKind, Outcome};

/// A decoded header map.
pub type Headers = std::collections::HashMap<String, String>;
