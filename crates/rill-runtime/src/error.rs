use rill_core::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Engine module not found: {0}")]
    ModuleNotFound(String),

    #[error("Compilation failed: {0}")]
    CompilationFailed(String),

    #[error("Instantiation failed: {0}")]
    InstantiationFailed(String),

    #[error("Engine module does not export `{0}`")]
    MissingExport(&'static str),

    #[error("Export `{name}` has the wrong signature: {reason}")]
    ExportSignature { name: &'static str, reason: String },

    #[error("Engine speaks ABI version {found}, host speaks {expected}")]
    AbiMismatch { expected: i32, found: i32 },

    #[error("Engine returned a null player handle")]
    NullPlayer,

    #[error(transparent)]
    Engine(#[from] EngineError),
}
