//! Validate command - Check a guest module against the bridge.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use tether_codec::abi::{ALLOC_EXPORT, HANDLE_EXPORT};
use tether_core::MEMORY_EXPORT;
use tether_wasm::prelude::*;

use crate::OutputFormat;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the WebAssembly module
    #[arg(required = true)]
    pub module: PathBuf,

    /// Also require the handler exports
    #[arg(long)]
    pub strict: bool,
}

/// Validation result.
#[derive(Debug, Default, Serialize)]
struct ValidationResult {
    valid: bool,
    path: String,
    module_name: Option<String>,
    exports: usize,
    imports: usize,
    handler: bool,
    required_capabilities: Vec<String>,
    unsatisfied_imports: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

fn check(
    runtime: &TetherRuntime,
    module: &ValidatedModule,
    strict: bool,
) -> Result<ValidationResult> {
    let mut result = ValidationResult {
        valid: true,
        module_name: module.name().map(String::from),
        exports: module.exports().len(),
        imports: module.imports().len(),
        handler: module.has_export(HANDLE_EXPORT) && module.has_export(ALLOC_EXPORT),
        ..Default::default()
    };

    for import in runtime.unsatisfied_imports(module)? {
        result
            .unsatisfied_imports
            .push(format!("{}.{}", import.module, import.name));
    }
    if !result.unsatisfied_imports.is_empty() {
        result.valid = false;
        result.errors.push(format!(
            "Module imports {} function(s) the bridge does not provide",
            result.unsatisfied_imports.len()
        ));
    }

    let linker = runtime.linker::<()>()?;
    for function in linker.registered_functions() {
        if !module.requires_import(&function.module, &function.name) {
            continue;
        }
        if let Some(id) = &function.required_capability {
            let id = id.to_string();
            if !result.required_capabilities.contains(&id) {
                result.required_capabilities.push(id);
            }
        }
    }

    let bridge_imports = module.imports().len() - result.unsatisfied_imports.len();
    if bridge_imports > 0 && !module.has_export(MEMORY_EXPORT) {
        result.valid = false;
        result
            .errors
            .push(format!("Module calls host functions but exports no \"{MEMORY_EXPORT}\""));
    }

    if !result.handler {
        let message = format!("Module does not export both {HANDLE_EXPORT} and {ALLOC_EXPORT}");
        if strict {
            result.valid = false;
            result.errors.push(message);
        } else {
            result.warnings.push(message);
        }
    }

    Ok(result)
}

/// Execute the validate command.
pub fn execute(args: ValidateArgs, config: BridgeConfig, format: OutputFormat) -> Result<()> {
    let runtime = Tether::builder()
        .with_bridge_config(config)
        .build()
        .context("Failed to create runtime")?;

    let mut result = match runtime.load_file(&args.module) {
        Ok(module) => check(&runtime, &module, args.strict)?,
        Err(e) => ValidationResult {
            errors: vec![e.to_string()],
            ..Default::default()
        },
    };
    result.path = args.module.display().to_string();

    match format {
        OutputFormat::Human => {
            if result.valid {
                println!("Module is valid: {}", result.path);
                if let Some(name) = &result.module_name {
                    println!("  Name: {}", name);
                }
                println!("  Exports: {}", result.exports);
                println!("  Imports: {}", result.imports);
                println!("  Handler: {}", if result.handler { "yes" } else { "no" });
                if !result.required_capabilities.is_empty() {
                    println!("  Capabilities: {}", result.required_capabilities.join(", "));
                }

                if !result.warnings.is_empty() {
                    println!("\nWarnings:");
                    for warning in &result.warnings {
                        println!("  - {}", warning);
                    }
                }
            } else {
                println!("Module is INVALID: {}", result.path);
                for error in &result.errors {
                    println!("  Error: {}", error);
                }
                for import in &result.unsatisfied_imports {
                    println!("  Unsatisfied: {}", import);
                }
            }
        }
        OutputFormat::Json | OutputFormat::JsonCompact => {
            println!("{}", format.to_json(&result)?);
        }
    }

    if result.valid {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Validation failed"))
    }
}
