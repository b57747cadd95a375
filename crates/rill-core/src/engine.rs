use std::time::Duration;

use crate::action::ActionId;
use crate::error::EngineError;

/// Raw JSON text of an error buffer returned by the engine.
pub type RawReport = String;

/// One running engine instance, seen from the bridge.
///
/// Implementations own every foreign buffer they touch: arguments are
/// copied in and released before the method returns, and owned results are
/// copied out and released before the method returns. Nothing handed across
/// this trait refers to engine memory.
///
/// `Ok(Some(report))` from a delivery means the engine signalled failure;
/// `Err` means the call itself failed.
pub trait PlaybackEngine: Send {
    fn start(&mut self, manifest: &[u8]) -> Result<Option<RawReport>, EngineError>;

    fn deliver_fetch_result(
        &mut self,
        action_id: ActionId,
        bytes: &[u8],
    ) -> Result<Option<RawReport>, EngineError>;

    fn deliver_timeout(&mut self, action_id: ActionId) -> Result<Option<RawReport>, EngineError>;

    /// Whether [`PlaybackEngine::deliver_fetch_failure`] is available.
    fn supports_fetch_failure(&self) -> bool {
        false
    }

    fn deliver_fetch_failure(
        &mut self,
        _action_id: ActionId,
        _reason: &str,
    ) -> Result<Option<RawReport>, EngineError> {
        Err(EngineError::Unsupported("player_deliver_fetch_failure"))
    }

    /// Whether [`PlaybackEngine::deliver_fetch_timing`] is available.
    fn supports_fetch_timing(&self) -> bool {
        false
    }

    /// How long the fetch for `action_id` took. Delivered just before the
    /// fetched bytes, as the engine's bandwidth sample.
    fn deliver_fetch_timing(
        &mut self,
        _action_id: ActionId,
        _elapsed: Duration,
    ) -> Result<Option<RawReport>, EngineError> {
        Err(EngineError::Unsupported("player_deliver_fetch_timing"))
    }

    /// Next pending action as JSON, or `None` when the queue is empty.
    fn next_action(&mut self) -> Result<Option<String>, EngineError>;

    /// Next ready segment, or `None`.
    fn next_segment(&mut self) -> Result<Option<Vec<u8>>, EngineError>;
}

/// Creates one engine per playback session, bound to its manifest URL.
pub trait EngineFactory {
    fn create(&self, manifest_url: &str) -> Result<Box<dyn PlaybackEngine>, EngineError>;
}
