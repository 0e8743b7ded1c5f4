//! Separator-delimited encoding understood by existing guest modules.
//!
//! Maps are rendered as `key:value` records joined by `|`. Errors are the
//! message prefixed with `[ERR]`, followed by `[code]` when the code is
//! nonzero. Nothing is escaped: a separator inside a key or value changes how
//! the text decodes. Decoding splits each record on the first `:` only, so
//! values such as `text/html; charset=UTF-8` or URLs survive, but keys never
//! may contain either separator.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{CodecError, CodecResult};

/// Separator between records of a map.
pub const RECORD_SEPARATOR: char = '|';

/// Separator between the key and value of one record.
pub const FIELD_SEPARATOR: char = ':';

/// Prefix marking a failure string.
pub const ERROR_TAG: &str = "[ERR]";

/// Prefix of the body in a handler response envelope.
pub const BODY_TAG: &str = "[BODY]";

/// Marker between body and headers in a handler response envelope.
pub const HEADERS_TAG: &str = "[HEADERS]";

/// Decode a header blob into a map.
///
/// Empty records are ignored. A record without a field separator cannot be
/// split into a pair; it is skipped and logged, so a malformed blob yields a
/// partial map rather than an error. When a key repeats, the last record wins.
pub fn decode_map(blob: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for record in records(blob) {
        match record.split_once(FIELD_SEPARATOR) {
            Some((key, value)) => {
                map.insert(key.to_string(), value.to_string());
            }
            None => warn!(record, "Skipping record without field separator"),
        }
    }

    map
}

/// Decode a header blob, failing on the first record without a separator.
pub fn try_decode_map(blob: &str) -> CodecResult<HashMap<String, String>> {
    records(blob)
        .map(|record| {
            record
                .split_once(FIELD_SEPARATOR)
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| CodecError::MalformedRecord {
                    record: record.to_string(),
                    separator: FIELD_SEPARATOR,
                })
        })
        .collect()
}

fn records(blob: &str) -> impl Iterator<Item = &str> {
    blob.split(RECORD_SEPARATOR).filter(|record| !record.is_empty())
}

/// Encode pairs as a header blob.
///
/// Rejects keys containing either separator and values containing the record
/// separator, since those would not decode back to the same pairs.
pub fn encode_map<I, K, V>(pairs: I) -> CodecResult<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = String::new();

    for (key, value) in pairs {
        let (key, value) = (key.as_ref(), value.as_ref());

        if let Some(character) = key
            .chars()
            .find(|c| *c == RECORD_SEPARATOR || *c == FIELD_SEPARATOR)
        {
            return Err(CodecError::ReservedCharacter {
                character,
                position: "key",
                text: key.to_string(),
            });
        }
        if value.contains(RECORD_SEPARATOR) {
            return Err(CodecError::ReservedCharacter {
                character: RECORD_SEPARATOR,
                position: "value",
                text: value.to_string(),
            });
        }

        if !out.is_empty() {
            out.push(RECORD_SEPARATOR);
        }
        out.push_str(key);
        out.push(FIELD_SEPARATOR);
        out.push_str(value);
    }

    Ok(out)
}

/// Render a failure string. A zero code means "no code" and is omitted.
pub fn encode_error(message: &str, code: u32) -> String {
    if code == 0 {
        format!("{ERROR_TAG}{message}")
    } else {
        format!("{ERROR_TAG}{message}[{code}]")
    }
}

/// Check whether a result string carries the failure tag.
pub fn is_error(text: &str) -> bool {
    text.starts_with(ERROR_TAG)
}

/// Split a failure string into message and code.
///
/// Returns `None` for strings without the failure tag. A message that itself
/// ends in `[digits]` is indistinguishable from a coded failure.
pub fn decode_error(text: &str) -> Option<(String, u32)> {
    let body = text.strip_prefix(ERROR_TAG)?;

    let coded = body
        .strip_suffix(']')
        .and_then(|rest| rest.rsplit_once('['))
        .filter(|(_, digits)| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|(message, digits)| Some((message, digits.parse::<u32>().ok()?)))
        .filter(|(_, code)| *code != 0);

    match coded {
        Some((message, code)) => Some((message.to_string(), code)),
        None => Some((body.to_string(), 0)),
    }
}

/// Render a handler response as `[BODY]body[HEADERS]headers`.
pub fn encode_response(body: &str, headers: &HashMap<String, String>) -> CodecResult<String> {
    Ok(format!("{BODY_TAG}{body}{HEADERS_TAG}{}", encode_map(headers)?))
}

/// Split a handler response envelope into body and headers.
///
/// The last `[HEADERS]` marker is the split point, so a body may contain the
/// marker text but a header blob may not.
pub fn decode_response(text: &str) -> CodecResult<(String, HashMap<String, String>)> {
    let rest = text
        .strip_prefix(BODY_TAG)
        .ok_or(CodecError::MissingTag(BODY_TAG))?;
    let (body, headers) = rest
        .rsplit_once(HEADERS_TAG)
        .ok_or(CodecError::MissingTag(HEADERS_TAG))?;

    Ok((body.to_string(), decode_map(headers)))
}
