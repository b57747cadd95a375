use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use wasmtime::{Config, Engine, Linker};

use crate::sandbox::SandboxState;

/// `[engine]` section of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Path to the engine `.wasm` (or `.wat`) module.
    pub module: Option<PathBuf>,
    /// Where compiled modules are cached. Defaults to `~/.rill/modules`.
    pub cache_dir: Option<PathBuf>,
    /// Fuel granted to each engine call; unset means unmetered.
    pub fuel_per_call: Option<u64>,
    #[serde(default = "default_forward_stderr")]
    pub forward_stderr: bool,
}

fn default_forward_stderr() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            module: None,
            cache_dir: None,
            fuel_per_call: None,
            forward_stderr: default_forward_stderr(),
        }
    }
}

/// Shared Wasmtime engine and linker.
///
/// Built once and shared by every engine module and session. Each session
/// gets its own `Store`, so sessions never share linear memory.
pub struct RuntimeContext {
    pub engine: Engine,
    pub linker: Linker<SandboxState>,
    pub(crate) fuel_per_call: Option<u64>,
    pub(crate) forward_stderr: bool,
}

impl RuntimeContext {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let mut wasm_config = Config::new();
        if config.fuel_per_call.is_some() {
            wasm_config.consume_fuel(true);
        }

        let engine = Engine::new(&wasm_config)?;
        let mut linker: Linker<SandboxState> = Linker::new(&engine);

        // Only resolved for engines that actually import WASI.
        wasmtime_wasi::preview1::add_to_linker_sync(&mut linker, |state: &mut SandboxState| {
            state.wasi_mut()
        })?;

        tracing::debug!(
            fuel_per_call = ?config.fuel_per_call,
            "RuntimeContext initialized (core modules + WASI p1)"
        );

        Ok(Self {
            engine,
            linker,
            fuel_per_call: config.fuel_per_call,
            forward_stderr: config.forward_stderr,
        })
    }
}
