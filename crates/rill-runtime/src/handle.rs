use std::time::Duration;

use rill_core::{ActionId, EngineError, PlaybackEngine, RawReport};

use crate::error::RuntimeError;
use crate::exports::ABI_VERSION;
use crate::memory::ForeignMemory;

/// A player created inside one engine instance.
///
/// Owns the instance's memory and the player handle; `player_free` runs on
/// drop.
pub struct EngineHandle {
    memory: ForeignMemory,
    player: i32,
}

impl EngineHandle {
    /// Check the ABI version and create a player bound to `manifest_url`.
    pub(crate) fn create(mut memory: ForeignMemory, manifest_url: &str) -> Result<Self, RuntimeError> {
        let found = memory.call("abi_version", |e| &e.abi_version, ())?;
        if found != ABI_VERSION {
            return Err(RuntimeError::AbiMismatch {
                expected: ABI_VERSION,
                found,
            });
        }

        // player_new takes ownership of the url buffer.
        let url = memory.allocate_text(manifest_url)?.transfer();
        let player = memory.call("player_new", |e| &e.player_new, url)?;
        if player == 0 {
            return Err(RuntimeError::NullPlayer);
        }

        tracing::debug!(player, manifest_url, "Engine player created");
        Ok(Self { memory, player })
    }

    pub fn memory(&mut self) -> &mut ForeignMemory {
        &mut self.memory
    }

    /// Read an engine statistics counter, if the engine exports it.
    pub fn probe(&mut self, name: &'static str) -> Result<i32, EngineError> {
        self.memory.probe(name)
    }
}

impl PlaybackEngine for EngineHandle {
    fn start(&mut self, manifest: &[u8]) -> Result<Option<RawReport>, EngineError> {
        let player = self.player;
        self.memory.with_bytes(manifest, |m, buf| {
            let report = m.call("player_start", |e| &e.player_start, (player, buf.raw()))?;
            m.take_text(report)
        })
    }

    fn deliver_fetch_result(
        &mut self,
        action_id: ActionId,
        bytes: &[u8],
    ) -> Result<Option<RawReport>, EngineError> {
        let player = self.player;
        self.memory.with_bytes(bytes, |m, buf| {
            let report = m.call(
                "player_deliver_fetch_result",
                |e| &e.deliver_fetch_result,
                (player, action_id.to_wire(), buf.raw()),
            )?;
            m.take_text(report)
        })
    }

    fn deliver_timeout(&mut self, action_id: ActionId) -> Result<Option<RawReport>, EngineError> {
        let report = self.memory.call(
            "player_deliver_timeout",
            |e| &e.deliver_timeout,
            (self.player, action_id.to_wire()),
        )?;
        self.memory.take_text(report)
    }

    fn supports_fetch_failure(&self) -> bool {
        self.memory.exports().deliver_fetch_failure.is_some()
    }

    fn deliver_fetch_failure(
        &mut self,
        action_id: ActionId,
        reason: &str,
    ) -> Result<Option<RawReport>, EngineError> {
        if !self.supports_fetch_failure() {
            return Err(EngineError::Unsupported("player_deliver_fetch_failure"));
        }
        let player = self.player;
        self.memory.with_text(reason, |m, buf| {
            let report = m.call_hook(
                "player_deliver_fetch_failure",
                |e| e.deliver_fetch_failure.as_ref(),
                (player, action_id.to_wire(), buf.raw()),
            )?;
            m.take_text(report)
        })
    }

    fn supports_fetch_timing(&self) -> bool {
        self.memory.exports().deliver_fetch_timing.is_some()
    }

    fn deliver_fetch_timing(
        &mut self,
        action_id: ActionId,
        elapsed: Duration,
    ) -> Result<Option<RawReport>, EngineError> {
        let elapsed_ms = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
        let report = self.memory.call_hook(
            "player_deliver_fetch_timing",
            |e| e.deliver_fetch_timing.as_ref(),
            (self.player, action_id.to_wire(), elapsed_ms),
        )?;
        self.memory.take_text(report)
    }

    fn next_action(&mut self) -> Result<Option<String>, EngineError> {
        let raw = self
            .memory
            .call("player_next_action", |e| &e.next_action, self.player)?;
        self.memory.take_text(raw)
    }

    fn next_segment(&mut self) -> Result<Option<Vec<u8>>, EngineError> {
        let raw = self
            .memory
            .call("player_next_segment", |e| &e.next_segment, self.player)?;
        self.memory.take_bytes(raw)
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Err(e) = self.memory.call("player_free", |e| &e.player_free, self.player) {
            tracing::warn!(player = self.player, "Failed to free engine player: {e}");
        }
    }
}
