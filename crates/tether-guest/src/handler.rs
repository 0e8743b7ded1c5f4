//! The handler a guest registers and the adapter that marshals around it.

use tether_codec::{Failure, FailureKind, Headers, Outcome, WireFormat};
use thiserror::Error;

/// A handler's reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Response body.
    pub body: String,
    /// Response headers.
    pub headers: Headers,
}

impl Response {
    /// A response with `body` and no headers.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            headers: Headers::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A failed invocation, reported to the host as a tagged error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Error text.
    pub message: String,
    /// Numeric code; 0 for none.
    pub code: u32,
}

impl HandlerError {
    /// An error without a code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: 0,
        }
    }

    /// Attach a numeric code.
    pub fn with_code(mut self, code: u32) -> Self {
        self.code = code;
        self
    }
}

impl From<Failure> for HandlerError {
    fn from(failure: Failure) -> Self {
        Self {
            message: failure.message,
            code: failure.code,
        }
    }
}

/// The callback a guest exposes for inbound requests.
pub trait Handler {
    /// Handle one request.
    fn handle(&self, body: String, headers: Headers) -> Result<Response, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(String, Headers) -> Result<Response, HandlerError>,
{
    fn handle(&self, body: String, headers: Headers) -> Result<Response, HandlerError> {
        self(body, headers)
    }
}

/// Turns raw request strings into handler calls and the result back into
/// one encoded string.
///
/// ```
/// use tether_guest::{HandlerAdapter, HandlerError, Headers, Response};
///
/// fn greet(body: String, _headers: Headers) -> Result<Response, HandlerError> {
///     Ok(Response::new(format!("hola {body}")).with_header("Content-Type", "text/plain"))
/// }
///
/// let adapter = HandlerAdapter::new(greet);
/// assert_eq!(
///     adapter.invoke("mundo", ""),
///     "[BODY]hola mundo[HEADERS]Content-Type:text/plain"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct HandlerAdapter<H> {
    handler: H,
    format: WireFormat,
}

impl<H: Handler> HandlerAdapter<H> {
    /// Wrap `handler` using the delimited wire format.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            format: WireFormat::Delimited,
        }
    }

    /// Use `format` for headers, responses and errors.
    pub fn with_wire_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    /// Run the handler on raw request strings.
    pub fn invoke(&self, body: &str, headers: &str) -> String {
        let headers = match self.format.decode_headers(headers) {
            Ok(headers) => headers,
            Err(err) => return self.failure(FailureKind::Encoding, err.to_string(), 0),
        };

        match self.handler.handle(body.to_string(), headers) {
            Ok(response) => match self.format.encode_response(&response.body, &response.headers) {
                Ok(encoded) => encoded,
                Err(err) => self.failure(FailureKind::Encoding, err.to_string(), 0),
            },
            Err(err) => self.failure(FailureKind::Unclassified, err.message, err.code),
        }
    }

    fn failure(&self, kind: FailureKind, message: String, code: u32) -> String {
        self.format
            .encode_outcome(&Outcome::Failure(Failure::new(kind, message).with_code(code)))
    }
}
