use std::path::Path;
use std::sync::Arc;

use rill_core::{EngineError, EngineFactory, PlaybackEngine};
use wasmtime::{Module, Store};

use crate::cache::ModuleCache;
use crate::error::RuntimeError;
use crate::exports::{ABI_VERSION, EngineExports};
use crate::handle::EngineHandle;
use crate::memory::ForeignMemory;
use crate::runtime_context::RuntimeContext;
use crate::sandbox::SandboxState;

/// What `rill check` reports about an engine module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiInfo {
    pub version: i32,
    pub fetch_failure_hook: bool,
    pub fetch_timing_hook: bool,
}

/// A compiled engine, ready to instantiate once per session.
pub struct EngineModule {
    context: Arc<RuntimeContext>,
    module: Module,
}

impl EngineModule {
    /// Read and compile an engine module from disk, through `cache` when
    /// given. Accepts `.wasm` binaries and `.wat` text.
    pub fn load(
        context: Arc<RuntimeContext>,
        path: &Path,
        cache: Option<&ModuleCache>,
    ) -> Result<Self, RuntimeError> {
        let bytes = std::fs::read(path)
            .map_err(|e| RuntimeError::ModuleNotFound(format!("{}: {e}", path.display())))?;

        tracing::info!(path = %path.display(), size = bytes.len(), "Loading engine module");

        let module = match cache {
            Some(cache) => cache.load_or_compile(&bytes, &context.engine)?,
            None => Module::new(&context.engine, &bytes)
                .map_err(|e| RuntimeError::CompilationFailed(format!("{}: {e:#}", path.display())))?,
        };
        Ok(Self { context, module })
    }

    pub fn from_bytes(context: Arc<RuntimeContext>, bytes: &[u8]) -> Result<Self, RuntimeError> {
        let module = Module::new(&context.engine, bytes)
            .map_err(|e| RuntimeError::CompilationFailed(format!("{e:#}")))?;
        Ok(Self { context, module })
    }

    /// Instantiate in a fresh sandbox without creating a player.
    pub fn sandbox(&self) -> Result<ForeignMemory, RuntimeError> {
        let mut store = Store::new(
            &self.context.engine,
            SandboxState::new(self.context.forward_stderr),
        );
        if let Some(fuel) = self.context.fuel_per_call {
            store
                .set_fuel(fuel)
                .map_err(|e| RuntimeError::InstantiationFailed(format!("cannot set fuel: {e}")))?;
        }

        let instance = self
            .context
            .linker
            .instantiate(&mut store, &self.module)
            .map_err(|e| RuntimeError::InstantiationFailed(format!("{e:#}")))?;
        let exports = EngineExports::resolve(&instance, &mut store)?;

        Ok(ForeignMemory::new(
            store,
            instance,
            exports,
            self.context.fuel_per_call,
        ))
    }

    /// Create a player for one playback session.
    pub fn instantiate(&self, manifest_url: &str) -> Result<EngineHandle, RuntimeError> {
        EngineHandle::create(self.sandbox()?, manifest_url)
    }

    /// Instantiate once and report the ABI surface, without creating a
    /// player. Fails on a version mismatch or a missing or mistyped export.
    pub fn check(&self) -> Result<AbiInfo, RuntimeError> {
        let mut memory = self.sandbox()?;
        let version = memory.call("abi_version", |e| &e.abi_version, ())?;
        if version != ABI_VERSION {
            return Err(RuntimeError::AbiMismatch {
                expected: ABI_VERSION,
                found: version,
            });
        }
        Ok(AbiInfo {
            version,
            fetch_failure_hook: memory.exports().deliver_fetch_failure.is_some(),
            fetch_timing_hook: memory.exports().deliver_fetch_timing.is_some(),
        })
    }
}

impl EngineFactory for EngineModule {
    fn create(&self, manifest_url: &str) -> Result<Box<dyn PlaybackEngine>, EngineError> {
        match self.instantiate(manifest_url) {
            Ok(handle) => Ok(Box::new(handle)),
            Err(RuntimeError::Engine(e)) => Err(e),
            Err(e) => Err(EngineError::Create(e.to_string())),
        }
    }
}
