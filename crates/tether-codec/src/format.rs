//! Selection between the delimited and length-prefixed wire formats.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CodecResult;
use crate::outcome::{Failure, FailureKind, Outcome};
use crate::{delimited, length_prefixed};

/// How composite values cross the guest boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireFormat {
    /// `key:value|key:value` maps and `[ERR]` tagged failures.
    ///
    /// Bit-compatible with existing guests. All failure kinds share one shape.
    #[default]
    Delimited,
    /// Length-prefixed fields; any text round-trips and failures keep their kind.
    LengthPrefixed,
}

impl WireFormat {
    /// Decode a header blob.
    ///
    /// The delimited format never fails: malformed records are dropped.
    pub fn decode_headers(self, blob: &str) -> CodecResult<HashMap<String, String>> {
        match self {
            WireFormat::Delimited => Ok(delimited::decode_map(blob)),
            WireFormat::LengthPrefixed => length_prefixed::decode_map(blob),
        }
    }

    /// Encode a header map.
    pub fn encode_headers(self, headers: &HashMap<String, String>) -> CodecResult<String> {
        match self {
            WireFormat::Delimited => delimited::encode_map(headers),
            WireFormat::LengthPrefixed => Ok(length_prefixed::encode_map(headers)),
        }
    }

    /// Render an outcome as the single result string handed to the guest.
    pub fn encode_outcome(self, outcome: &Outcome) -> String {
        match self {
            WireFormat::Delimited => match outcome {
                Outcome::Success(payload) => payload.clone(),
                Outcome::Failure(failure) => {
                    delimited::encode_error(&failure.message, failure.code)
                }
            },
            WireFormat::LengthPrefixed => length_prefixed::encode_outcome(outcome),
        }
    }

    /// Parse a result string back into an outcome.
    ///
    /// In the delimited format a successful payload that starts with the
    /// failure tag is read as a failure.
    pub fn decode_outcome(self, text: &str) -> CodecResult<Outcome> {
        match self {
            WireFormat::Delimited => Ok(match delimited::decode_error(text) {
                Some((message, code)) => Outcome::Failure(
                    Failure::new(FailureKind::Unclassified, message).with_code(code),
                ),
                None => Outcome::Success(text.to_string()),
            }),
            WireFormat::LengthPrefixed => length_prefixed::decode_outcome(text),
        }
    }

    /// Encode a handler response envelope.
    pub fn encode_response(
        self,
        body: &str,
        headers: &HashMap<String, String>,
    ) -> CodecResult<String> {
        match self {
            WireFormat::Delimited => delimited::encode_response(body, headers),
            WireFormat::LengthPrefixed => Ok(length_prefixed::encode_response(body, headers)),
        }
    }

    /// Decode a handler response envelope.
    pub fn decode_response(self, text: &str) -> CodecResult<(String, HashMap<String, String>)> {
        match self {
            WireFormat::Delimited => delimited::decode_response(text),
            WireFormat::LengthPrefixed => length_prefixed::decode_response(text),
        }
    }
}
