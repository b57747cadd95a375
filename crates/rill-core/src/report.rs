use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::ActionId;
use crate::error::BridgeError;

/// Structured error decoded from a non-null engine return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: String,
    #[serde(alias = "reason")]
    pub message: String,
    /// Anything else the engine attached (e.g. a `trace`).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ErrorReport {
    /// Decode the contents of an error buffer. The buffer has already been
    /// released by the time this runs.
    pub fn decode(raw: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(raw).map_err(|source| BridgeError::MalformedReport {
            raw: raw.to_string(),
            source,
        })
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Which engine entry point produced a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryContext {
    Start { manifest_url: String },
    FetchResult { action_id: ActionId, url: String },
    FetchTiming { action_id: ActionId, url: String },
    FetchFailure { action_id: ActionId, url: String },
    Timeout { action_id: ActionId },
}

impl fmt::Display for DeliveryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryContext::Start { manifest_url } => write!(f, "start ({manifest_url})"),
            DeliveryContext::FetchResult { action_id, url } => {
                write!(f, "fetch result [{action_id}] {url}")
            }
            DeliveryContext::FetchTiming { action_id, url } => {
                write!(f, "fetch timing [{action_id}] {url}")
            }
            DeliveryContext::FetchFailure { action_id, url } => {
                write!(f, "fetch failure [{action_id}] {url}")
            }
            DeliveryContext::Timeout { action_id } => write!(f, "timeout [{action_id}]"),
        }
    }
}

/// User-visible event surfaced at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    EngineReported {
        context: DeliveryContext,
        report: ErrorReport,
    },
    FetchFailed {
        action_id: ActionId,
        url: String,
        reason: String,
    },
    UnknownAction {
        raw: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::EngineReported { context, report } => {
                write!(f, "Engine error during {context}\n\n[Reason]\n{report}")
            }
            Notice::FetchFailed {
                action_id,
                url,
                reason,
            } => write!(f, "Cannot fetch url [{action_id}] {url}: {reason}"),
            Notice::UnknownAction { raw } => write!(f, "Ignored unknown action: {raw}"),
        }
    }
}
