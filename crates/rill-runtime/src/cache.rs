use std::path::{Path, PathBuf};

use anyhow::Result;
use sha2::{Digest, Sha256};
use wasmtime::{Engine, Module};

use crate::error::RuntimeError;

const PRECOMPILED_EXT: &str = "cwasm";

/// Disk cache of compiled engine modules.
///
/// Layout under `base_dir`:
/// ```text
/// {base_dir}/
///   {sha256 of source bytes}.cwasm   - precompiled (Wasmtime serialized)
/// ```
///
/// Keyed by content, so editing an engine module never picks up a stale
/// artifact. An artifact Wasmtime refuses to load (different version or
/// settings) is recompiled and overwritten.
pub struct ModuleCache {
    base_dir: PathBuf,
}

impl ModuleCache {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".rill")
            .join("modules")
    }

    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn cwasm_path(&self, hash: &str) -> PathBuf {
        self.base_dir.join(format!("{hash}.{PRECOMPILED_EXT}"))
    }

    /// Load a module from the cache, compiling and storing it on a miss.
    pub fn load_or_compile(&self, bytes: &[u8], engine: &Engine) -> Result<Module, RuntimeError> {
        let hash = hash_bytes(bytes);
        let cwasm_path = self.cwasm_path(&hash);

        if cwasm_path.exists() {
            match self.load_precompiled(&cwasm_path, engine) {
                Ok(module) => {
                    tracing::debug!(hash, "Loaded engine from precompiled cache");
                    return Ok(module);
                }
                Err(e) => tracing::debug!(hash, "Precompiled cache invalid, recompiling: {e}"),
            }
        }

        let module = Module::new(engine, bytes)
            .map_err(|e| RuntimeError::CompilationFailed(format!("{e:#}")))?;

        match module.serialize() {
            Ok(serialized) => {
                if let Err(e) = std::fs::write(&cwasm_path, serialized) {
                    tracing::warn!(path = %cwasm_path.display(), "Failed to write precompiled cache: {e}");
                } else {
                    tracing::debug!(hash, "Saved precompiled cache");
                }
            }
            Err(e) => tracing::warn!(hash, "Cannot serialize compiled engine: {e}"),
        }

        Ok(module)
    }

    fn load_precompiled(&self, path: &Path, engine: &Engine) -> Result<Module> {
        // SAFETY: cwasm files in this directory are only written by
        // `load_or_compile` from `Module::serialize`. Wasmtime checks the
        // version and configuration header and rejects mismatches.
        unsafe { Module::deserialize_file(engine, path) }
    }
}

/// Hex SHA-256 of a module's source bytes.
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
