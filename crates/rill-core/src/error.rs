use thiserror::Error;

use crate::report::ErrorReport;

/// Failure of a call into the engine itself (not an engine-reported error).
///
/// After any of these the instance state is unknown, so the session ends.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine call `{call}` trapped: {reason}")]
    Trap { call: &'static str, reason: String },

    #[error("engine memory access failed during `{call}`: {reason}")]
    Memory { call: &'static str, reason: String },

    #[error("engine returned a text buffer that is not UTF-8 from `{call}`")]
    InvalidText { call: &'static str },

    #[error("engine does not export `{0}`")]
    Unsupported(&'static str),

    #[error("engine creation failed: {0}")]
    Create(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("server returned {status}")]
    Status { status: u16 },

    #[error("no response configured for {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("append failed: {0}")]
    Append(String),

    #[error("finalize failed: {0}")]
    Finalize(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed action from engine: {source} (raw: {raw})")]
    MalformedAction {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed error report from engine: {source} (raw: {raw})")]
    MalformedReport {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("engine reported error during {context}: {report}")]
    EngineReported { context: String, report: ErrorReport },

    #[error("cannot fetch manifest {url}: {source}")]
    ManifestFetch {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("dispatch #{0} completed but was not in flight")]
    UnknownCompletion(u64),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("effect task failed: {0}")]
    Effect(#[from] tokio::task::JoinError),
}

impl BridgeError {
    /// Protocol errors are the bridge's own unrecoverable failures.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            BridgeError::MalformedAction { .. } | BridgeError::MalformedReport { .. }
        )
    }
}
