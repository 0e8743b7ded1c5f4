//! Network capability for outbound HTTP.

use std::any::Any;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::capability::{
    Action, Capability, CapabilityId, DenialReason, PermissionResult, standard_ids,
};
use crate::error::CapabilityError;

/// Action type for outbound HTTP requests.
pub const HTTP_REQUEST: &str = "net:http";

/// Actions related to network operations.
#[derive(Debug, Clone)]
pub enum NetworkAction {
    /// Make an HTTP request.
    HttpRequest {
        /// Target URL.
        url: String,
        /// Request method.
        method: String,
    },
}

impl Action for NetworkAction {
    fn action_type(&self) -> &str {
        match self {
            NetworkAction::HttpRequest { .. } => HTTP_REQUEST,
        }
    }

    fn description(&self) -> String {
        match self {
            NetworkAction::HttpRequest { url, method } => format!("{} {}", method, url),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Pattern for matching hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostPattern {
    /// Exact host match.
    Exact(String),
    /// Wildcard pattern (e.g., "*.example.com").
    Wildcard(String),
    /// Any host.
    Any,
}

impl HostPattern {
    /// Parse a pattern: `*` is any host, a leading `*.` is a wildcard.
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            HostPattern::Any
        } else if pattern.starts_with("*.") {
            HostPattern::Wildcard(pattern.to_ascii_lowercase())
        } else {
            HostPattern::Exact(pattern.to_ascii_lowercase())
        }
    }

    /// Check if a host matches this pattern. Hosts compare case-insensitively.
    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        match self {
            HostPattern::Exact(pattern) => pattern.eq_ignore_ascii_case(&host),
            HostPattern::Wildcard(pattern) => match pattern.strip_prefix("*.") {
                Some(base) => {
                    host.eq_ignore_ascii_case(base)
                        || host.ends_with(&pattern[1..].to_ascii_lowercase())
                }
                None => pattern.eq_ignore_ascii_case(&host),
            },
            HostPattern::Any => true,
        }
    }
}

/// Capability for outbound HTTP.
///
/// ```
/// use tether_capability::{HostPattern, NetworkCapability};
///
/// let cap = NetworkCapability::new(vec![
///     HostPattern::Exact("example.com".to_string()),
///     HostPattern::Wildcard("*.example.com".to_string()),
/// ])
/// .with_plain_http(false);
///
/// assert!(cap.is_host_allowed("api.example.com"));
/// ```
#[derive(Debug, Clone)]
pub struct NetworkCapability {
    allowed_hosts: Vec<HostPattern>,
    allow_plain_http: bool,
    allowed_methods: Option<Vec<String>>,
}

impl NetworkCapability {
    /// Allow HTTP and HTTPS requests to hosts matching any pattern.
    pub fn new(allowed_hosts: Vec<HostPattern>) -> Self {
        Self {
            allowed_hosts,
            allow_plain_http: true,
            allowed_methods: None,
        }
    }

    /// Allow requests to any host.
    pub fn allow_all() -> Self {
        Self::new(vec![HostPattern::Any])
    }

    /// Allow only HTTPS requests to the given exact hosts.
    pub fn https_only(hosts: Vec<String>) -> Self {
        Self::new(hosts.into_iter().map(HostPattern::Exact).collect()).with_plain_http(false)
    }

    /// Permit or forbid `http://` URLs.
    pub fn with_plain_http(mut self, allowed: bool) -> Self {
        self.allow_plain_http = allowed;
        self
    }

    /// Restrict the methods a guest may use.
    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    /// Check if a host is allowed.
    pub fn is_host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.iter().any(|p| p.matches(host))
    }

    fn check(&self, action: &NetworkAction) -> PermissionResult {
        let NetworkAction::HttpRequest { url, method } = action;
        let deny = |message: String| {
            PermissionResult::Denied(DenialReason::new(self.id(), HTTP_REQUEST, message))
        };

        let Some((scheme, host)) = scheme_and_host(url) else {
            return deny(format!("Invalid URL: {}", url));
        };

        match scheme.as_str() {
            "https" => {}
            "http" if self.allow_plain_http => {}
            "http" => return deny("Plain HTTP not allowed".to_string()),
            other => return deny(format!("Scheme not allowed: {}", other)),
        }

        if !self.is_host_allowed(&host) {
            return deny(format!("Host not allowed: {}", host));
        }

        if let Some(methods) = &self.allowed_methods {
            if !methods.iter().any(|m| m == method) {
                return deny(format!("Method not allowed: {}", method));
            }
        }

        PermissionResult::Allowed
    }
}

impl Capability for NetworkCapability {
    fn id(&self) -> CapabilityId {
        standard_ids::NETWORK.clone()
    }

    fn name(&self) -> &str {
        "Network"
    }

    fn permits(&self, action: &dyn Action) -> PermissionResult {
        match action.as_any().downcast_ref::<NetworkAction>() {
            Some(action) => self.check(action),
            None => PermissionResult::NotApplicable,
        }
    }

    fn handled_action_types(&self) -> Vec<&'static str> {
        vec![HTTP_REQUEST]
    }

    fn validate(&self) -> Result<(), CapabilityError> {
        if self.allowed_hosts.is_empty() {
            return Err(CapabilityError::InvalidConfig(
                "Network capability has no allowed hosts".to_string(),
            ));
        }
        Ok(())
    }
}

/// Scheme and host of `url` as an HTTP client resolves them.
///
/// Userinfo and port are dropped and IPv6 brackets stripped. URLs without a
/// host do not parse.
fn scheme_and_host(url: &str) -> Option<(String, String)> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some((parsed.scheme().to_string(), host.to_string()))
}
