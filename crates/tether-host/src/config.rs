//! Bridge configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! wire_format = "length-prefixed"
//! overflow_policy = "reject"
//!
//! [http]
//! timeout_ms = 5000
//! user_agent = "tether/0.1"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_codec::WireFormat;

use crate::memory::OverflowPolicy;

/// Settings shared by every host function of a runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Encoding of header maps and outcomes at the guest boundary.
    pub wire_format: WireFormat,
    /// Behaviour when a result exceeds the guest's return buffer.
    pub overflow_policy: OverflowPolicy,
    /// Outbound HTTP settings.
    pub http: HttpConfig,
}

impl BridgeConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wire format.
    pub fn with_wire_format(mut self, format: WireFormat) -> Self {
        self.wire_format = format;
        self
    }

    /// Set the overflow policy.
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Set the per-request HTTP timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Per-request timeout in milliseconds. Unset means only the sandbox's
    /// call deadline applies.
    pub timeout_ms: Option<u64>,
    /// `User-Agent` sent when the guest does not set one.
    pub user_agent: Option<String>,
}

impl HttpConfig {
    /// The configured timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.wire_format, WireFormat::Delimited);
        assert_eq!(config.overflow_policy, OverflowPolicy::Truncate);
        assert!(config.http.timeout().is_none());
    }

    #[test]
    fn test_full_document() {
        let config: BridgeConfig = toml::from_str(
            r#"
            wire_format = "length-prefixed"
            overflow_policy = "reject"

            [http]
            timeout_ms = 2500
            user_agent = "tether-test"
            "#,
        )
        .unwrap();

        assert_eq!(config.wire_format, WireFormat::LengthPrefixed);
        assert_eq!(config.overflow_policy, OverflowPolicy::Reject);
        assert_eq!(config.http.timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.http.user_agent.as_deref(), Some("tether-test"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<BridgeConfig>("retries = 3").is_err());
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::new()
            .with_wire_format(WireFormat::LengthPrefixed)
            .with_http_timeout(Duration::from_secs(2));

        assert_eq!(config.http.timeout_ms, Some(2000));
    }
}
