//! Run command - Execute a guest module with bridge capabilities.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;

use tether_codec::abi::{ALLOC_EXPORT, HANDLE_EXPORT};
use tether_wasm::prelude::*;

use crate::OutputFormat;
use crate::commands::{parse_env_pair, parse_header};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Path to the WebAssembly module
    #[arg(required = true)]
    pub module: PathBuf,

    /// Call this export instead of the handler (takes no arguments)
    #[arg(short = 'e', long = "invoke")]
    pub invoke: Option<String>,

    /// Request body passed to the handler
    #[arg(long, default_value = "")]
    pub body: String,

    /// Request header passed to the handler (Name:Value)
    #[arg(long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Allow HTTP calls to HOST (`*.domain` wildcards accepted)
    #[arg(long = "allow-http", value_name = "HOST")]
    pub allow_http: Vec<String>,

    /// Allow HTTP calls to any host
    #[arg(long, conflicts_with = "allow_http")]
    pub allow_any_host: bool,

    /// Refuse plain http:// URLs
    #[arg(long)]
    pub https_only: bool,

    /// Variable visible to the guest (NAME=VALUE)
    #[arg(long = "env", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Allow the guest to read NAME (defaults to every --env name)
    #[arg(long = "allow-env", value_name = "NAME")]
    pub allow_env: Vec<String>,

    /// Memory limit in bytes (default: 64MB)
    #[arg(long, default_value = "67108864")]
    pub memory_limit: usize,

    /// Fuel limit for execution (default: 1B)
    #[arg(long, default_value = "1000000000")]
    pub fuel_limit: u64,

    /// Execution timeout in seconds (default: 30)
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Show execution metrics
    #[arg(long)]
    pub metrics: bool,
}

/// What was executed and how it ended.
#[derive(Debug, Serialize)]
struct RunReport {
    module: String,
    function: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    duration_ms: u128,
    fuel_consumed: u64,
    host_calls: u64,
}

fn build_runtime(args: &RunArgs, config: BridgeConfig) -> Result<TetherRuntime> {
    let mut builder = Tether::builder()
        .with_memory_limit(args.memory_limit)
        .with_fuel_limit(args.fuel_limit)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_bridge_config(config)
        .with_env_vars(args.env.iter().cloned());

    let hosts: Vec<HostPattern> = if args.allow_any_host {
        vec![HostPattern::Any]
    } else {
        args.allow_http.iter().map(|h| HostPattern::parse(h)).collect()
    };
    if !hosts.is_empty() {
        builder = builder
            .with_network(NetworkCapability::new(hosts).with_plain_http(!args.https_only));
    }

    let readable: Vec<&str> = if args.allow_env.is_empty() {
        args.env.iter().map(|(name, _)| name.as_str()).collect()
    } else {
        args.allow_env.iter().map(String::as_str).collect()
    };
    if !readable.is_empty() {
        builder = builder.with_env(EnvCapability::allow_only(readable));
    }

    builder.build().context("Failed to create runtime")
}

/// Pick the export to run when `--invoke` is absent.
fn default_entry(module: &ValidatedModule) -> Result<Option<&'static str>> {
    if module.has_export(HANDLE_EXPORT) && module.has_export(ALLOC_EXPORT) {
        return Ok(None);
    }
    for name in ["_start", "main"] {
        if module.has_export(name) {
            return Ok(Some(name));
        }
    }
    bail!("Module exports neither a handler nor _start/main; use --invoke")
}

/// Execute the run command.
pub fn execute(
    args: RunArgs,
    config: BridgeConfig,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let runtime = build_runtime(&args, config)?;

    let module = runtime
        .load_file(&args.module)
        .context("Failed to load module")?;

    let unsatisfied = runtime.unsatisfied_imports(&module)?;
    if let Some(import) = unsatisfied.first() {
        bail!(
            "Module imports {}.{}, which the bridge does not provide",
            import.module,
            import.name
        );
    }
    for id in runtime.missing_capabilities()? {
        tracing::warn!(capability = %id, "Capability not granted; calls will be denied");
    }

    let entry = match &args.invoke {
        Some(name) => Some(name.as_str()),
        None => default_entry(&module)?,
    };

    if !quiet {
        tracing::info!(
            module = %args.module.display(),
            function = entry.unwrap_or(HANDLE_EXPORT),
            "Executing module"
        );
    }

    let mut sandbox = runtime.sandbox().build().context("Failed to create sandbox")?;
    sandbox
        .load_module(&module)
        .context("Failed to load module into sandbox")?;

    let mut report = RunReport {
        module: args.module.display().to_string(),
        function: entry.unwrap_or(HANDLE_EXPORT).to_string(),
        success: true,
        body: None,
        headers: BTreeMap::new(),
        error: None,
        duration_ms: 0,
        fuel_consumed: 0,
        host_calls: 0,
    };

    let start = Instant::now();
    match entry {
        Some(function) => {
            if let Err(e) = sandbox.call_void(function) {
                report.success = false;
                report.error = Some(e.to_string());
            }
        }
        None => {
            let headers: Headers = args.headers.iter().cloned().collect();
            match runtime.invoke_handler(&mut sandbox, &args.body, &headers) {
                Ok(reply) => {
                    report.body = Some(reply.body);
                    report.headers = reply.headers.into_iter().collect();
                }
                Err(e) => {
                    report.success = false;
                    report.error = Some(e.to_string());
                }
            }
        }
    }
    report.duration_ms = start.elapsed().as_millis();

    let metrics = sandbox.metrics();
    report.fuel_consumed = metrics.fuel_consumed;
    report.host_calls = metrics.host_calls;

    match format {
        OutputFormat::Human => print_human(&report, args.metrics, quiet),
        OutputFormat::Json | OutputFormat::JsonCompact => println!("{}", format.to_json(&report)?),
    }

    match report.error {
        Some(error) => Err(anyhow::anyhow!("Execution failed: {}", error)),
        None => Ok(()),
    }
}

fn print_human(report: &RunReport, metrics: bool, quiet: bool) {
    if let Some(body) = &report.body {
        for (name, value) in &report.headers {
            println!("{}: {}", name, value);
        }
        if !report.headers.is_empty() {
            println!();
        }
        println!("{}", body);
    } else if report.success && !quiet {
        println!(
            "Execution of {} completed successfully in {}ms",
            report.function, report.duration_ms
        );
    }

    if metrics {
        println!("\nMetrics:");
        println!("  Duration: {}ms", report.duration_ms);
        println!("  Fuel consumed: {}", report.fuel_consumed);
        println!("  Host calls: {}", report.host_calls);
    }
}
