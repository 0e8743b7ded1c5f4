//! Self-describing length-prefixed encoding.
//!
//! Every field is written as `<byte length>:<bytes>,`, so field contents are
//! never scanned for separators and any text round-trips.

use std::collections::HashMap;

use crate::error::{CodecError, CodecResult};
use crate::outcome::{Failure, FailureKind, Outcome};

const OK_TAG: &str = "ok";
const ERR_TAG: &str = "err";

/// Append one length-prefixed field to `out`.
pub fn write_field(out: &mut String, field: &str) {
    out.push_str(&field.len().to_string());
    out.push(':');
    out.push_str(field);
    out.push(',');
}

/// Sequential reader over length-prefixed fields.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> FieldReader<'a> {
    /// Create a reader positioned at the start of `input`.
    pub fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    /// Whether all input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.input.len()
    }

    /// Read the next field.
    pub fn next_field(&mut self) -> CodecResult<&'a str> {
        let offset = self.offset;
        let rest = &self.input[offset..];

        let colon = rest.find(':').ok_or(CodecError::Truncated { offset })?;
        let digits = &rest[..colon];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodecError::InvalidLength { offset });
        }
        let len: usize = digits
            .parse()
            .map_err(|_| CodecError::InvalidLength { offset })?;

        let start = colon + 1;
        let end = start
            .checked_add(len)
            .ok_or(CodecError::InvalidLength { offset })?;
        if end > rest.len() {
            return Err(CodecError::Truncated { offset });
        }
        let field = rest
            .get(start..end)
            .ok_or(CodecError::InvalidLength { offset })?;

        match rest.as_bytes().get(end) {
            Some(b',') => {}
            Some(_) => return Err(CodecError::MissingTerminator { offset }),
            None => return Err(CodecError::Truncated { offset }),
        }

        self.offset += end + 1;
        Ok(field)
    }
}

/// Encode pairs as alternating key and value fields.
pub fn encode_map<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = String::new();
    for (key, value) in pairs {
        write_field(&mut out, key.as_ref());
        write_field(&mut out, value.as_ref());
    }
    out
}

/// Decode alternating key and value fields.
pub fn decode_map(blob: &str) -> CodecResult<HashMap<String, String>> {
    let mut reader = FieldReader::new(blob);
    read_map(&mut reader)
}

fn read_map(reader: &mut FieldReader<'_>) -> CodecResult<HashMap<String, String>> {
    let mut map = HashMap::new();

    while !reader.is_empty() {
        let key = reader.next_field()?;
        if reader.is_empty() {
            return Err(CodecError::MissingValue {
                key: key.to_string(),
            });
        }
        let value = reader.next_field()?;
        map.insert(key.to_string(), value.to_string());
    }

    Ok(map)
}

/// Encode an outcome as `ok,payload` or `err,kind,message,code` fields.
pub fn encode_outcome(outcome: &Outcome) -> String {
    let mut out = String::new();

    match outcome {
        Outcome::Success(payload) => {
            write_field(&mut out, OK_TAG);
            write_field(&mut out, payload);
        }
        Outcome::Failure(failure) => {
            write_field(&mut out, ERR_TAG);
            write_field(&mut out, failure.kind.as_str());
            write_field(&mut out, &failure.message);
            write_field(&mut out, &failure.code.to_string());
        }
    }

    out
}

/// Decode an outcome written by [`encode_outcome`].
pub fn decode_outcome(text: &str) -> CodecResult<Outcome> {
    let mut reader = FieldReader::new(text);

    match reader.next_field()? {
        OK_TAG => Ok(Outcome::Success(reader.next_field()?.to_string())),
        ERR_TAG => {
            let kind = reader.next_field()?;
            let kind = FailureKind::parse(kind)
                .ok_or_else(|| CodecError::UnknownTag(kind.to_string()))?;
            let message = reader.next_field()?.to_string();
            let code = reader.next_field()?;
            let code = code
                .parse::<u32>()
                .map_err(|_| CodecError::InvalidCode(code.to_string()))?;

            Ok(Outcome::Failure(Failure::new(kind, message).with_code(code)))
        }
        other => Err(CodecError::UnknownTag(other.to_string())),
    }
}

/// Encode a handler response as a body field followed by header fields.
pub fn encode_response(body: &str, headers: &HashMap<String, String>) -> String {
    let mut out = String::new();
    write_field(&mut out, body);
    out.push_str(&encode_map(headers));
    out
}

/// Decode a handler response written by [`encode_response`].
pub fn decode_response(text: &str) -> CodecResult<(String, HashMap<String, String>)> {
    let mut reader = FieldReader::new(text);
    let body = reader.next_field()?.to_string();
    let headers = read_map(&mut reader)?;
    Ok((body, headers))
}
