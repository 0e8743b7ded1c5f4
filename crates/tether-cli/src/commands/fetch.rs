//! Fetch command - One HTTP call through the dispatcher, as a guest would make it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use tether_codec::{Headers, Outcome};
use tether_host::memory;
use tether_host::{
    BackendFactory, BridgeConfig, CallScope, FlatMemory, GuestRegion, HttpCallArgs,
    HttpDispatcher, ReqwestBackendFactory,
};

use crate::OutputFormat;
use crate::commands::parse_header;

/// Arguments for the fetch command.
#[derive(Args)]
pub struct FetchArgs {
    /// Request method, passed through unchecked
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Target URL
    #[arg(short, long)]
    pub url: String,

    /// Request header (Name:Value)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body
    #[arg(short, long, default_value = "")]
    pub body: String,

    /// Size of the return buffer in bytes
    #[arg(long, default_value = "65536")]
    pub capacity: u32,

    /// Call deadline in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// The wire string and what it decodes to.
#[derive(Debug, Serialize)]
struct FetchReport {
    wire: String,
    written: usize,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<u32>,
}

fn perform(dispatcher: &HttpDispatcher, args: &FetchArgs) -> Result<FetchReport> {
    let format = dispatcher.config().wire_format;
    let headers: Headers = args.headers.iter().cloned().collect();
    let blob = format
        .encode_headers(&headers)
        .context("Headers cannot be encoded")?;

    let mut mem = FlatMemory::new();
    let call = HttpCallArgs {
        url: mem.place(args.url.as_bytes()),
        method: mem.place(args.method.as_bytes()),
        headers: mem.place(blob.as_bytes()),
        body: mem.place(args.body.as_bytes()),
        ret: mem.reserve(args.capacity),
    };

    let mut scope = CallScope::unbounded();
    if let Some(secs) = args.timeout {
        scope = scope.with_deadline(Instant::now() + Duration::from_secs(secs));
    }

    let written = dispatcher
        .handle(&mut mem, &call, &scope)
        .context("Host call trapped")?;
    let len = u32::try_from(written).context("Result length exceeds the address space")?;
    let wire = memory::read_string(&mem, GuestRegion::new(call.ret.ptr, len))?;

    let (success, failure_kind, code) = match format.decode_outcome(&wire) {
        Ok(Outcome::Success(_)) => (true, None, None),
        Ok(Outcome::Failure(failure)) => (
            false,
            Some(failure.kind.to_string()),
            Some(failure.code).filter(|&code| code != 0),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Result does not decode");
            (false, None, None)
        }
    };

    Ok(FetchReport {
        wire,
        written,
        success,
        failure_kind,
        code,
    })
}

/// Execute the fetch command.
pub fn execute(args: FetchArgs, config: BridgeConfig, format: OutputFormat) -> Result<()> {
    let mut factory = ReqwestBackendFactory::new();
    if let Some(user_agent) = &config.http.user_agent {
        factory = factory.with_user_agent(user_agent.as_str());
    }
    let factory: Arc<dyn BackendFactory> = Arc::new(factory);
    let dispatcher = HttpDispatcher::new(factory).with_config(config);

    let report = perform(&dispatcher, &args)?;

    match format {
        OutputFormat::Human => println!("{}", report.wire),
        OutputFormat::Json | OutputFormat::JsonCompact => println!("{}", format.to_json(&report)?),
    }

    if report.success {
        Ok(())
    } else {
        Err(anyhow::anyhow!("HTTP call failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_codec::WireFormat;
    use tether_host::{HttpBackend, HttpCall, HttpMethod, OverflowPolicy, TransportError};

    struct Echo;

    impl HttpBackend for Echo {
        fn execute(
            &self,
            method: HttpMethod,
            call: &HttpCall,
            _timeout: Option<Duration>,
        ) -> Result<String, TransportError> {
            let accept = call.headers.get("Accept").cloned().unwrap_or_default();
            Ok(format!("{method} {} {accept} {}", call.url, call.body))
        }
    }

    fn dispatcher(config: BridgeConfig) -> HttpDispatcher {
        let factory = || -> Box<dyn HttpBackend> { Box::new(Echo) };
        HttpDispatcher::new(Arc::new(factory)).with_config(config)
    }

    fn args(method: &str) -> FetchArgs {
        FetchArgs {
            method: method.to_string(),
            url: "https://a.test/x".to_string(),
            headers: vec![("Accept".to_string(), "text/plain".to_string())],
            body: "hi".to_string(),
            capacity: 1024,
            timeout: None,
        }
    }

    #[test]
    fn test_fetch_success() {
        let report = perform(&dispatcher(BridgeConfig::default()), &args("POST")).unwrap();

        assert!(report.success);
        assert_eq!(report.wire, "POST https://a.test/x text/plain hi");
        assert_eq!(report.written, report.wire.len());
    }

    #[test]
    fn test_fetch_keeps_nul_bytes() {
        struct Binary;

        impl HttpBackend for Binary {
            fn execute(
                &self,
                _method: HttpMethod,
                _call: &HttpCall,
                _timeout: Option<Duration>,
            ) -> Result<String, TransportError> {
                Ok("a\0b".to_string())
            }
        }

        let factory = || -> Box<dyn HttpBackend> { Box::new(Binary) };
        let dispatcher = HttpDispatcher::new(Arc::new(factory));
        let report = perform(&dispatcher, &args("GET")).unwrap();

        assert_eq!(report.written, 3);
        assert_eq!(report.wire, "a\0b");
        assert!(report.success);
    }

    #[test]
    fn test_fetch_unsupported_method() {
        let report = perform(&dispatcher(BridgeConfig::default()), &args("PATCH")).unwrap();

        assert!(!report.success);
        assert_eq!(report.wire, "[ERR]PATCH is not yet implemented");
        assert_eq!(report.failure_kind.as_deref(), Some("unclassified"));
    }

    #[test]
    fn test_fetch_length_prefixed() {
        let config = BridgeConfig::new().with_wire_format(WireFormat::LengthPrefixed);
        let report = perform(&dispatcher(config), &args("DELETE")).unwrap();

        assert!(!report.success);
        assert_eq!(report.failure_kind.as_deref(), Some("unsupported_method"));
    }

    #[test]
    fn test_fetch_truncates_to_capacity() {
        let mut small = args("GET");
        small.capacity = 4;
        let report = perform(&dispatcher(BridgeConfig::default()), &small).unwrap();

        assert_eq!(report.wire, "GET ");
    }

    #[test]
    fn test_fetch_reject_overflow_errors() {
        let config = BridgeConfig::new().with_overflow_policy(OverflowPolicy::Reject);
        let mut small = args("GET");
        small.capacity = 4;

        assert!(perform(&dispatcher(config), &small).is_err());
    }
}
