use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Correlation token chosen by the engine. Returned unchanged with the
/// outcome of the effect it names.
///
/// Any `i64` is valid, negative values included, and the engine may reuse a
/// value while an earlier action with it is still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub i64);

impl ActionId {
    /// Value for the `i64` parameters of the engine ABI.
    pub fn to_wire(self) -> i64 {
        self.0
    }
}

impl From<i64> for ActionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An effect requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    Fetch { action_id: ActionId, url: String },
    SetTimeout { action_id: ActionId, duration_ms: u64 },
    #[serde(other)]
    Unknown,
}

impl Action {
    /// Decode one `next_action` payload.
    ///
    /// Anything that is not JSON, has no `type`, or has a known `type` with
    /// the wrong fields is a protocol error. An unrecognised `type` decodes
    /// to [`Action::Unknown`].
    pub fn decode(raw: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(raw).map_err(|source| BridgeError::MalformedAction {
            raw: raw.to_string(),
            source,
        })
    }

    pub fn id(&self) -> Option<ActionId> {
        match *self {
            Action::Fetch { action_id, .. } | Action::SetTimeout { action_id, .. } => {
                Some(action_id)
            }
            Action::Unknown => None,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Fetch { .. } => ActionKind::Fetch,
            Action::SetTimeout { .. } => ActionKind::SetTimeout,
            Action::Unknown => ActionKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Fetch,
    SetTimeout,
    Unknown,
}
