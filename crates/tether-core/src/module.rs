//! WASM module loading and inspection.
//!
//! Modules are compiled once by a [`ModuleLoader`] and can be instantiated
//! into any number of sandboxes. The extracted [`ModuleMetadata`] lets
//! callers check a guest against the host functions they are able to link
//! before instantiating it.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use wasmtime::{ExternType, FuncType, Module};

use crate::engine::TetherEngine;
use crate::error::{ModuleError, ModuleResult};

/// A compiled WebAssembly module ready for instantiation.
#[derive(Clone)]
pub struct ValidatedModule {
    inner: Module,
    metadata: ModuleMetadata,
}

impl ValidatedModule {
    /// Get a reference to the underlying Wasmtime module.
    pub fn inner(&self) -> &Module {
        &self.inner
    }

    /// Get the module metadata.
    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    /// Get the module name, if set.
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// Get the list of exports.
    pub fn exports(&self) -> &[ExportInfo] {
        &self.metadata.exports
    }

    /// Get the list of imports.
    pub fn imports(&self) -> &[ImportInfo] {
        &self.metadata.imports
    }

    /// Check if the module has a specific export.
    pub fn has_export(&self, name: &str) -> bool {
        self.metadata.exports.iter().any(|e| e.name == name)
    }

    /// Look up an exported function's shape.
    pub fn export_signature(&self, name: &str) -> Option<Signature> {
        self.metadata
            .exports
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| match &e.kind {
                ExportKind::Function(signature) => Some(signature.clone()),
                _ => None,
            })
    }

    /// Check if the module requires a specific import.
    pub fn requires_import(&self, module: &str, name: &str) -> bool {
        self.metadata
            .imports
            .iter()
            .any(|i| i.module == module && i.name == name)
    }

    /// Imports for which `is_provided` returns `false`.
    pub fn unsatisfied_imports<F>(&self, mut is_provided: F) -> Vec<&ImportInfo>
    where
        F: FnMut(&ImportInfo) -> bool,
    {
        self.metadata
            .imports
            .iter()
            .filter(|import| !is_provided(import))
            .collect()
    }
}

impl std::fmt::Debug for ValidatedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedModule")
            .field("name", &self.metadata.name)
            .field("exports", &self.metadata.exports.len())
            .field("imports", &self.metadata.imports.len())
            .finish()
    }
}

/// Metadata extracted from a WASM module.
#[derive(Debug, Clone, Default)]
pub struct ModuleMetadata {
    /// Module name, if specified.
    pub name: Option<String>,
    /// List of exported items.
    pub exports: Vec<ExportInfo>,
    /// List of required imports.
    pub imports: Vec<ImportInfo>,
    /// Exported memories.
    pub memories: Vec<MemoryInfo>,
}

/// Value types of a function's parameters and results, rendered as
/// wasm type names (`i32`, `i64`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Parameter types.
    pub params: Vec<String>,
    /// Result types.
    pub results: Vec<String>,
}

impl Signature {
    fn from_func_type(func: &FuncType) -> Self {
        Self {
            params: func.params().map(|ty| ty.to_string()).collect(),
            results: func.results().map(|ty| ty.to_string()).collect(),
        }
    }

    /// Check the signature against expected type names.
    pub fn matches(&self, params: &[&str], results: &[&str]) -> bool {
        self.params.iter().map(String::as_str).eq(params.iter().copied())
            && self.results.iter().map(String::as_str).eq(results.iter().copied())
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}) -> ({})", self.params.join(", "), self.results.join(", "))
    }
}

/// Information about an exported item.
#[derive(Debug, Clone)]
pub struct ExportInfo {
    /// Export name.
    pub name: String,
    /// Type of the export.
    pub kind: ExportKind,
}

/// The kind of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    /// A function export.
    Function(Signature),
    /// A memory export.
    Memory,
    /// A global export.
    Global,
    /// A table export.
    Table,
}

/// Information about a required import.
#[derive(Debug, Clone)]
pub struct ImportInfo {
    /// Import module name.
    pub module: String,
    /// Import name.
    pub name: String,
    /// Type of the import.
    pub kind: ImportKind,
}

/// The kind of an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// A function import.
    Function(Signature),
    /// A memory import.
    Memory,
    /// A global import.
    Global,
    /// A table import.
    Table,
}

/// Information about an exported memory.
#[derive(Debug, Clone)]
pub struct MemoryInfo {
    /// Minimum memory size in pages (64KB each).
    pub min_pages: u64,
    /// Maximum memory size in pages, if specified.
    pub max_pages: Option<u64>,
}

/// Loader for WASM modules.
pub struct ModuleLoader {
    engine: Arc<TetherEngine>,
}

impl ModuleLoader {
    /// Create a new module loader with the given engine.
    pub fn new(engine: Arc<TetherEngine>) -> Self {
        Self { engine }
    }

    /// Load and validate a module from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid WASM module.
    pub fn load_bytes(&self, bytes: &[u8]) -> ModuleResult<ValidatedModule> {
        debug!(size = bytes.len(), "Loading WASM module from bytes");

        let module = Module::new(self.engine.inner(), bytes)?;
        Ok(self.validated(module))
    }

    /// Load and validate a module from a `.wasm` or `.wat` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid module.
    pub fn load_file(&self, path: &Path) -> ModuleResult<ValidatedModule> {
        debug!(path = %path.display(), "Loading WASM module from file");

        let bytes = std::fs::read(path)?;
        let module = if path.extension().is_some_and(|ext| ext == "wat") {
            let wasm = wat::parse_bytes(&bytes).map_err(|e| ModuleError::Invalid(e.to_string()))?;
            Module::new(self.engine.inner(), &wasm)?
        } else {
            Module::new(self.engine.inner(), &bytes)?
        };

        Ok(self.validated(module))
    }

    /// Load and validate a module from WAT (WebAssembly Text) format.
    ///
    /// # Errors
    ///
    /// Returns an error if the WAT is invalid.
    pub fn load_wat(&self, wat: &str) -> ModuleResult<ValidatedModule> {
        debug!(size = wat.len(), "Loading WASM module from WAT");

        let wasm = wat::parse_str(wat).map_err(|e| ModuleError::Invalid(e.to_string()))?;
        self.load_bytes(&wasm)
    }

    fn validated(&self, module: Module) -> ValidatedModule {
        let metadata = extract_metadata(&module);

        info!(
            name = ?metadata.name,
            exports = metadata.exports.len(),
            imports = metadata.imports.len(),
            "Loaded WASM module"
        );

        ValidatedModule {
            inner: module,
            metadata,
        }
    }
}

fn extract_metadata(module: &Module) -> ModuleMetadata {
    let exports = module
        .exports()
        .map(|export| ExportInfo {
            name: export.name().to_string(),
            kind: match export.ty() {
                ExternType::Func(func) => ExportKind::Function(Signature::from_func_type(&func)),
                ExternType::Memory(_) => ExportKind::Memory,
                ExternType::Global(_) => ExportKind::Global,
                ExternType::Table(_) => ExportKind::Table,
            },
        })
        .collect();

    let imports = module
        .imports()
        .map(|import| ImportInfo {
            module: import.module().to_string(),
            name: import.name().to_string(),
            kind: match import.ty() {
                ExternType::Func(func) => ImportKind::Function(Signature::from_func_type(&func)),
                ExternType::Memory(_) => ImportKind::Memory,
                ExternType::Global(_) => ImportKind::Global,
                ExternType::Table(_) => ImportKind::Table,
            },
        })
        .collect();

    let memories = module
        .exports()
        .filter_map(|export| match export.ty() {
            ExternType::Memory(mem) => Some(MemoryInfo {
                min_pages: mem.minimum(),
                max_pages: mem.maximum(),
            }),
            _ => None,
        })
        .collect();

    ModuleMetadata {
        name: module.name().map(String::from),
        exports,
        imports,
        memories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn create_loader() -> ModuleLoader {
        let engine = Arc::new(TetherEngine::new(EngineConfig::default()).unwrap());
        ModuleLoader::new(engine)
    }

    #[test]
    fn test_load_simple_module() {
        let loader = create_loader();

        let module = loader
            .load_wat(
                r#"
            (module
                (func (export "add") (param i32 i32) (result i32)
                    local.get 0
                    local.get 1
                    i32.add
                )
            )
        "#,
            )
            .unwrap();

        assert!(module.has_export("add"));
        assert_eq!(module.imports().len(), 0);

        let signature = module.export_signature("add").unwrap();
        assert!(signature.matches(&["i32", "i32"], &["i32"]));
        assert_eq!(signature.to_string(), "(i32, i32) -> (i32)");
    }

    #[test]
    fn test_unsatisfied_imports() {
        let loader = create_loader();

        let module = loader
            .load_wat(
                r#"
            (module
                (import "env" "host_http"
                    (func (param i32 i32 i32 i32 i32 i32 i32 i32 i32 i32)))
                (import "env" "host_kv_get" (func (param i32 i32)))
                (func (export "main"))
            )
        "#,
            )
            .unwrap();

        assert!(module.requires_import("env", "host_http"));

        let missing = module.unsatisfied_imports(|import| import.name == "host_http");
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "host_kv_get");
    }

    #[test]
    fn test_load_module_with_memory() {
        let loader = create_loader();

        let module = loader
            .load_wat(r#"(module (memory (export "memory") 1 10))"#)
            .unwrap();

        assert!(module.has_export("memory"));
        assert!(module.export_signature("memory").is_none());
        assert_eq!(module.metadata().memories.len(), 1);
        assert_eq!(module.metadata().memories[0].min_pages, 1);
        assert_eq!(module.metadata().memories[0].max_pages, Some(10));
    }

    #[test]
    fn test_load_invalid_module() {
        let loader = create_loader();
        assert!(loader.load_bytes(&[0, 1, 2, 3]).is_err());
        assert!(matches!(
            loader.load_wat("(module"),
            Err(ModuleError::Invalid(_))
        ));
    }
}
