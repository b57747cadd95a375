use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::action::ActionId;
use crate::error::{BridgeError, TransportError};

/// Lifecycle of one dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    Pending,
    InFlight,
    Completed,
    Failed,
}

/// Bridge-side sequence number of one dispatch.
///
/// Unique within a session, unlike the engine's [`ActionId`], which is an
/// opaque token the engine may repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct DispatchId(u64);

impl DispatchId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an effect task hands back to the session.
#[derive(Debug)]
pub(crate) enum Completion {
    Fetched {
        dispatch: DispatchId,
        action_id: ActionId,
        url: String,
        result: Result<Vec<u8>, TransportError>,
        elapsed: Duration,
    },
    TimerFired {
        dispatch: DispatchId,
        action_id: ActionId,
    },
}

#[derive(Debug)]
struct Entry {
    action_id: ActionId,
    state: EffectState,
}

/// Per-session record of dispatched actions, keyed by dispatch.
///
/// Completed actions are counted and forgotten; failed ones stay until the
/// engine has been told about them.
#[derive(Debug, Default)]
pub(crate) struct EffectLedger {
    entries: HashMap<DispatchId, Entry>,
    next: u64,
    completed: u64,
}

impl EffectLedger {
    pub fn begin(&mut self, action_id: ActionId) -> DispatchId {
        if self.entries.values().any(|e| e.action_id == action_id) {
            tracing::debug!(%action_id, "Engine reused an action id that is still tracked");
        }
        self.next += 1;
        let dispatch = DispatchId(self.next);
        self.entries.insert(
            dispatch,
            Entry {
                action_id,
                state: EffectState::Pending,
            },
        );
        dispatch
    }

    pub fn mark_in_flight(&mut self, dispatch: DispatchId) {
        if let Some(entry) = self.entries.get_mut(&dispatch) {
            entry.state = EffectState::InFlight;
        }
    }

    pub fn complete(&mut self, dispatch: DispatchId) -> Result<ActionId, BridgeError> {
        let action_id = self.take_in_flight(dispatch)?;
        self.completed += 1;
        Ok(action_id)
    }

    pub fn fail(&mut self, dispatch: DispatchId) -> Result<ActionId, BridgeError> {
        let action_id = self.take_in_flight(dispatch)?;
        self.entries.insert(
            dispatch,
            Entry {
                action_id,
                state: EffectState::Failed,
            },
        );
        Ok(action_id)
    }

    /// The engine has been told about a failure; stop tracking it.
    pub fn resolve(&mut self, dispatch: DispatchId) {
        self.entries.remove(&dispatch);
    }

    /// State of the most recent tracked dispatch carrying `action_id`.
    pub fn state(&self, action_id: ActionId) -> Option<EffectState> {
        self.entries
            .iter()
            .filter(|(_, e)| e.action_id == action_id)
            .max_by_key(|(dispatch, _)| **dispatch)
            .map(|(_, e)| e.state)
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Failed actions the engine is still waiting on, in id order. An id
    /// appears once per failed dispatch.
    pub fn unresolved(&self) -> Vec<ActionId> {
        let mut ids: Vec<ActionId> = self
            .entries
            .values()
            .filter(|e| e.state == EffectState::Failed)
            .map(|e| e.action_id)
            .collect();
        ids.sort();
        ids
    }

    fn take_in_flight(&mut self, dispatch: DispatchId) -> Result<ActionId, BridgeError> {
        match self.entries.remove(&dispatch) {
            Some(entry) if entry.state == EffectState::InFlight => Ok(entry.action_id),
            Some(entry) => {
                self.entries.insert(dispatch, entry);
                Err(BridgeError::UnknownCompletion(dispatch.get()))
            }
            None => Err(BridgeError::UnknownCompletion(dispatch.get())),
        }
    }
}
