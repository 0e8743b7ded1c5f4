//! Outbound HTTP backends.
//!
//! The dispatcher never talks to the network itself. It asks a
//! [`BackendFactory`] for a fresh [`HttpBackend`] on every call, so no
//! client state (default headers, cookies, connections) survives from one
//! guest request to the next.

use std::error::Error as _;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tether_codec::Headers;
use tracing::debug;

use crate::error::TransportError;

/// Methods the bridge forwards. Matching is case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`; the request body is ignored.
    Get,
    /// `POST`; the request body is sent as-is.
    Post,
}

impl HttpMethod {
    /// Parse an exact method name.
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            _ => None,
        }
    }

    /// The method name.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound request as decoded from guest memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpCall {
    /// Target URL.
    pub url: String,
    /// Method name exactly as the guest sent it.
    pub method: String,
    /// Request headers.
    pub headers: Headers,
    /// Request body.
    pub body: String,
}

impl HttpCall {
    /// Create a call without headers or body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            ..Self::default()
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// Performs one request and returns the response payload.
///
/// Any response, whatever its status code, is a success: the payload text is
/// returned unchanged.
pub trait HttpBackend {
    /// Execute `call` with `method`, giving up after `timeout` if set.
    fn execute(
        &self,
        method: HttpMethod,
        call: &HttpCall,
        timeout: Option<Duration>,
    ) -> Result<String, TransportError>;
}

/// Creates one backend per host call.
pub trait BackendFactory: Send + Sync {
    /// Create a backend for a single request.
    fn create(&self) -> Result<Box<dyn HttpBackend>, TransportError>;
}

impl<F> BackendFactory for F
where
    F: Fn() -> Box<dyn HttpBackend> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn HttpBackend>, TransportError> {
        Ok(self())
    }
}

/// Factory for [`ReqwestBackend`]s.
#[derive(Debug, Clone, Default)]
pub struct ReqwestBackendFactory {
    user_agent: Option<String>,
}

impl ReqwestBackendFactory {
    /// Create a factory with reqwest's defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `user_agent` unless the guest sets its own `User-Agent`.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

impl BackendFactory for ReqwestBackendFactory {
    fn create(&self) -> Result<Box<dyn HttpBackend>, TransportError> {
        let mut builder = Client::builder();
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let client = builder.build().map_err(transport_error)?;
        Ok(Box::new(ReqwestBackend { client }))
    }
}

/// Blocking `reqwest` client used for exactly one request.
#[derive(Debug)]
pub struct ReqwestBackend {
    client: Client,
}

impl HttpBackend for ReqwestBackend {
    fn execute(
        &self,
        method: HttpMethod,
        call: &HttpCall,
        timeout: Option<Duration>,
    ) -> Result<String, TransportError> {
        let headers = header_map(&call.headers)?;

        let mut request = match method {
            HttpMethod::Get => self.client.get(&call.url),
            HttpMethod::Post => self.client.post(&call.url).body(call.body.clone()),
        };
        request = request.headers(headers);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().map_err(transport_error)?;
        debug!(
            method = %method,
            url = %call.url,
            status = response.status().as_u16(),
            "Received HTTP response"
        );

        response.text().map_err(transport_error)
    }
}

fn header_map(headers: &Headers) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::InvalidRequest(format!("invalid header name {:?}: {}", name, e))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            TransportError::InvalidRequest(format!("invalid value for header {}: {}", name, e))
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Render a reqwest error with its source chain, the way the guest sees it.
fn transport_error(err: reqwest::Error) -> TransportError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    if err.is_timeout() {
        TransportError::Timeout(message)
    } else if err.is_builder() {
        TransportError::InvalidRequest(message)
    } else {
        TransportError::Request(message)
    }
}
