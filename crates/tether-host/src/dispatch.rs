//! The HTTP host function.
//!
//! [`HttpDispatcher::handle`] runs one `host_http` call end to end: read the
//! four argument regions, decode the header blob, check the grant, run the
//! request on a fresh backend and write the encoded outcome into the
//! guest's return buffer. Everything that can go wrong with the request
//! itself comes back in-band; only memory faults trap.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tether_capability::{CapabilitySet, NetworkAction, PermissionResult};
use tether_codec::{Failure, FailureKind, Outcome};
use tether_core::CancelToken;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::HostResult;
use crate::http::{BackendFactory, HttpCall, HttpMethod};
use crate::memory::{self, GuestMemory, GuestRegion, ReturnBuffer};

/// Time and cancellation bounds of the guest call a host call runs inside.
///
/// Cancellation is checked when a request is about to start. A request
/// already blocked in the backend runs to completion or to its timeout,
/// which the deadline bounds; later host calls in the same guest call then
/// report `Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CallScope {
    /// Instant by which the guest call must finish.
    pub deadline: Option<Instant>,
    /// Cancellation flag of the calling sandbox.
    pub cancel: Option<CancelToken>,
}

impl CallScope {
    /// A scope without deadline or cancellation.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Set the deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the cancel token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Whether the calling sandbox has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Time left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Raw `host_http` arguments as the guest passed them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpCallArgs {
    /// Region holding the URL.
    pub url: GuestRegion,
    /// Region holding the method name.
    pub method: GuestRegion,
    /// Region holding the encoded header map.
    pub headers: GuestRegion,
    /// Region holding the body.
    pub body: GuestRegion,
    /// Where the result goes.
    pub ret: ReturnBuffer,
}

/// Runs HTTP requests on behalf of guests.
///
/// ```
/// use std::sync::Arc;
/// use tether_host::{CallScope, HttpCall, HttpDispatcher, ReqwestBackendFactory};
///
/// let dispatcher = HttpDispatcher::new(Arc::new(ReqwestBackendFactory::new()));
/// let call = HttpCall::new("PUT", "https://example.com");
/// let outcome = dispatcher.dispatch(&call, &CallScope::unbounded());
///
/// assert_eq!(
///     dispatcher.config().wire_format.encode_outcome(&outcome),
///     "[ERR]PUT is not yet implemented"
/// );
/// ```
#[derive(Clone)]
pub struct HttpDispatcher {
    factory: Arc<dyn BackendFactory>,
    capabilities: Option<Arc<CapabilitySet>>,
    config: BridgeConfig,
}

impl HttpDispatcher {
    /// Create a dispatcher that allows every request.
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            capabilities: None,
            config: BridgeConfig::default(),
        }
    }

    /// Check every request against `capabilities`.
    pub fn with_capabilities(mut self, capabilities: Arc<CapabilitySet>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Use `config` for encoding, overflow and timeouts.
    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Handle one `host_http` call against guest memory.
    ///
    /// # Errors
    ///
    /// Fails (and the guest call traps) only when an argument region or the
    /// return buffer is out of bounds, an argument is not UTF-8, or the
    /// result overflows under [`OverflowPolicy::Reject`](crate::OverflowPolicy::Reject).
    pub fn handle<M: GuestMemory + ?Sized>(
        &self,
        memory: &mut M,
        args: &HttpCallArgs,
        scope: &CallScope,
    ) -> HostResult<usize> {
        let url = memory::read_string(memory, args.url)?;
        let method = memory::read_string(memory, args.method)?;
        let headers_blob = memory::read_string(memory, args.headers)?;
        let body = memory::read_string(memory, args.body)?;

        let outcome = if HttpMethod::parse(&method).is_none() {
            debug!(method = %method, "Unsupported HTTP method");
            Outcome::Failure(Failure::unsupported_method(&method))
        } else {
            match self.config.wire_format.decode_headers(&headers_blob) {
                Ok(headers) => self.dispatch(
                    &HttpCall {
                        url,
                        method,
                        headers,
                        body,
                    },
                    scope,
                ),
                Err(err) => {
                    warn!(error = %err, "Malformed header blob");
                    Outcome::failure(FailureKind::Encoding, err.to_string())
                }
            }
        };

        let text = self.config.wire_format.encode_outcome(&outcome);
        memory::write_string(memory, &text, args.ret, self.config.overflow_policy)
    }

    /// Run a decoded call and return its outcome.
    pub fn dispatch(&self, call: &HttpCall, scope: &CallScope) -> Outcome {
        let Some(method) = HttpMethod::parse(&call.method) else {
            debug!(method = %call.method, "Unsupported HTTP method");
            return Outcome::Failure(Failure::unsupported_method(&call.method));
        };

        if scope.is_cancelled() {
            info!(url = %call.url, "HTTP call cancelled");
            return Outcome::failure(FailureKind::Cancelled, "call cancelled");
        }

        let remaining = scope.remaining();
        if remaining.is_some_and(|left| left.is_zero()) {
            warn!(url = %call.url, "Call deadline passed before HTTP request");
            return Outcome::failure(FailureKind::Timeout, "call deadline exceeded");
        }

        if let Some(capabilities) = &self.capabilities {
            let action = NetworkAction::HttpRequest {
                url: call.url.clone(),
                method: call.method.clone(),
            };
            if let PermissionResult::Denied(reason) = capabilities.check_permission(&action) {
                warn!(url = %call.url, method = %call.method, reason = %reason, "HTTP call denied");
                return Outcome::failure(
                    FailureKind::PermissionDenied,
                    format!("permission denied: {}", reason.message),
                );
            }
        }

        let timeout = match (self.config.http.timeout(), remaining) {
            (Some(configured), Some(left)) => Some(configured.min(left)),
            (configured, left) => configured.or(left),
        };

        let backend = match self.factory.create() {
            Ok(backend) => backend,
            Err(err) => return Outcome::failure(err.failure_kind(), err.to_string()),
        };

        debug!(method = %method, url = %call.url, ?timeout, "Dispatching HTTP call");
        match backend.execute(method, call, timeout) {
            Ok(payload) => {
                info!(
                    method = %method,
                    url = %call.url,
                    bytes = payload.len(),
                    "HTTP call completed"
                );
                Outcome::Success(payload)
            }
            Err(err) => {
                warn!(method = %method, url = %call.url, error = %err, "HTTP call failed");
                Outcome::failure(err.failure_kind(), err.to_string())
            }
        }
    }
}

impl std::fmt::Debug for HttpDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDispatcher")
            .field("capabilities", &self.capabilities)
            .field("config", &self.config)
            .finish()
    }
}
