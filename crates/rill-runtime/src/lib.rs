//! Wasmtime host for rill playback engines.
//!
//! Loads an engine module, checks its ABI, and exposes each instance to the
//! bridge as a [`rill_core::PlaybackEngine`]. All crossing of the linear
//! memory boundary goes through [`ForeignMemory`].
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use rill_runtime::{EngineConfig, EngineModule, ModuleCache, RuntimeContext};
//!
//! # fn run() -> anyhow::Result<()> {
//! let context = Arc::new(RuntimeContext::new(&EngineConfig::default())?);
//! let cache = ModuleCache::new(ModuleCache::default_path());
//! cache.init()?;
//! let module = EngineModule::load(context, Path::new("engine.wasm"), Some(&cache))?;
//! let info = module.check()?;
//! println!("ABI v{}", info.version);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod exports;
pub mod handle;
pub mod memory;
pub mod module;
pub mod runtime_context;
pub mod sandbox;

pub use cache::ModuleCache;
pub use error::RuntimeError;
pub use exports::{ABI_VERSION, EngineExports};
pub use handle::EngineHandle;
pub use memory::{BufferKind, ForeignBuffer, ForeignMemory};
pub use module::{AbiInfo, EngineModule};
pub use runtime_context::{EngineConfig, RuntimeContext};
pub use sandbox::SandboxState;
