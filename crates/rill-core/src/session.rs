use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::action::{Action, ActionId};
use crate::bridge::{BridgeConfig, EngineErrorPolicy};
use crate::effects::{Completion, EffectLedger, EffectState};
use crate::engine::{PlaybackEngine, RawReport};
use crate::error::BridgeError;
use crate::feeder::{MediaSink, SegmentFeeder};
use crate::report::{DeliveryContext, ErrorReport, Notice};
use crate::timer::Timer;
use crate::transport::Transport;

/// How a session's poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// No segments, no actions, nothing in flight. The sink was finalized.
    Finished,
    /// The engine is still waiting on fetches that failed and that it could
    /// not be told about. The sink was left open.
    Stalled { unresolved: Vec<ActionId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub segments_appended: usize,
    pub actions_completed: u64,
    pub engine_errors: usize,
}

/// One playback session: the engine instance, its sink, and every effect
/// dispatched on its behalf.
///
/// Only the task driving the session calls into the engine. Effects run as
/// separate tasks and report back through a `JoinSet`; dropping the session
/// aborts them.
pub struct Session {
    engine: Box<dyn PlaybackEngine>,
    feeder: SegmentFeeder,
    transport: Arc<dyn Transport>,
    timer: Arc<dyn Timer>,
    config: BridgeConfig,
    effects: JoinSet<Completion>,
    ledger: EffectLedger,
    notices: Option<UnboundedSender<Notice>>,
    engine_errors: usize,
}

impl Session {
    pub fn new(
        engine: Box<dyn PlaybackEngine>,
        sink: Box<dyn MediaSink>,
        transport: Arc<dyn Transport>,
        timer: Arc<dyn Timer>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            engine,
            feeder: SegmentFeeder::new(sink),
            transport,
            timer,
            config,
            effects: JoinSet::new(),
            ledger: EffectLedger::default(),
            notices: None,
            engine_errors: 0,
        }
    }

    /// Send user-visible notices to `tx` in addition to logging them.
    pub fn with_notices(mut self, tx: UnboundedSender<Notice>) -> Self {
        self.notices = Some(tx);
        self
    }

    /// Hand the already-fetched manifest to the engine.
    ///
    /// A report from `start` always ends the session: there is nothing to
    /// play.
    pub fn start(&mut self, manifest_url: &str, manifest: &[u8]) -> Result<(), BridgeError> {
        tracing::debug!(url = manifest_url, bytes = manifest.len(), "Starts playing manifest");
        let Some(raw) = self.engine.start(manifest)? else {
            return Ok(());
        };
        let context = DeliveryContext::Start {
            manifest_url: manifest_url.to_string(),
        };
        let report = self.record_report(&context, &raw)?;
        Err(BridgeError::EngineReported {
            context: context.to_string(),
            report,
        })
    }

    /// One pass of the poll loop: feed at most one segment to the sink, then
    /// drain the action queue to exhaustion, dispatching each action.
    ///
    /// With nothing queued on either side this has no observable effect.
    pub fn pump(&mut self) -> Result<(), BridgeError> {
        let engine = &mut self.engine;
        self.feeder.feed(|| engine.next_segment())?;
        self.drain_actions()
    }

    /// Drive the session until the stream ends, stalls, or fails.
    pub async fn run(&mut self) -> Result<SessionReport, BridgeError> {
        loop {
            self.pump()?;
            if !self.feeder.is_busy() && self.effects.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = self.effects.join_next(), if !self.effects.is_empty() => {
                    self.complete(joined?)?;
                }
                appended = self.feeder.settle(), if self.feeder.is_busy() => {
                    appended?;
                }
                else => break,
            }
        }

        let unresolved = self.ledger.unresolved();
        let outcome = if unresolved.is_empty() {
            self.feeder.finalize().await?;
            tracing::info!(segments = self.feeder.appended(), "Stream ended; sink finalized");
            SessionOutcome::Finished
        } else {
            tracing::warn!(
                ?unresolved,
                "Engine is waiting on fetches that failed; playback stalled"
            );
            SessionOutcome::Stalled { unresolved }
        };

        Ok(self.report(outcome))
    }

    pub fn effect_state(&self, action_id: ActionId) -> Option<EffectState> {
        self.ledger.state(action_id)
    }

    pub fn in_flight(&self) -> usize {
        self.effects.len()
    }

    pub fn segments_appended(&self) -> usize {
        self.feeder.appended()
    }

    fn report(&self, outcome: SessionOutcome) -> SessionReport {
        SessionReport {
            outcome,
            segments_appended: self.feeder.appended(),
            actions_completed: self.ledger.completed(),
            engine_errors: self.engine_errors,
        }
    }

    fn drain_actions(&mut self) -> Result<(), BridgeError> {
        while let Some(raw) = self.engine.next_action()? {
            let action = Action::decode(&raw)?;
            tracing::debug!(kind = ?action.kind(), action_id = ?action.id(), "Dequeued action");
            match action {
                Action::Fetch { action_id, url } => self.dispatch_fetch(action_id, url),
                Action::SetTimeout {
                    action_id,
                    duration_ms,
                } => self.dispatch_timeout(action_id, duration_ms),
                Action::Unknown => {
                    tracing::warn!(%raw, "Unknown action; skipping");
                    self.notify(Notice::UnknownAction { raw });
                }
            }
        }
        Ok(())
    }

    fn dispatch_fetch(&mut self, action_id: ActionId, url: String) {
        let dispatch = self.ledger.begin(action_id);
        tracing::debug!(%action_id, %dispatch, %url, "Starts fetching url");

        let transport = Arc::clone(&self.transport);
        self.effects.spawn(async move {
            let started = Instant::now();
            let result = transport.fetch(&url).await;
            Completion::Fetched {
                dispatch,
                action_id,
                url,
                result,
                elapsed: started.elapsed(),
            }
        });
        self.ledger.mark_in_flight(dispatch);
    }

    fn dispatch_timeout(&mut self, action_id: ActionId, duration_ms: u64) {
        let dispatch = self.ledger.begin(action_id);
        tracing::debug!(%action_id, %dispatch, duration_ms, "Setting timer");

        let fired = self.timer.after(Duration::from_millis(duration_ms));
        self.effects.spawn(async move {
            fired.await;
            Completion::TimerFired {
                dispatch,
                action_id,
            }
        });
        self.ledger.mark_in_flight(dispatch);
    }

    fn complete(&mut self, completion: Completion) -> Result<(), BridgeError> {
        match completion {
            Completion::Fetched {
                dispatch,
                action_id,
                url,
                result: Ok(bytes),
                elapsed,
            } => {
                self.ledger.complete(dispatch)?;
                tracing::debug!(
                    %action_id,
                    %url,
                    bytes = bytes.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Fetched"
                );
                // Timing precedes the bytes it describes.
                if self.engine.supports_fetch_timing() {
                    let report = self.engine.deliver_fetch_timing(action_id, elapsed)?;
                    self.surface(
                        DeliveryContext::FetchTiming {
                            action_id,
                            url: url.clone(),
                        },
                        report,
                    )?;
                }
                let report = self.engine.deliver_fetch_result(action_id, &bytes)?;
                self.surface(DeliveryContext::FetchResult { action_id, url }, report)
            }
            Completion::Fetched {
                dispatch,
                action_id,
                url,
                result: Err(error),
                ..
            } => {
                self.ledger.fail(dispatch)?;
                let reason = error.to_string();
                tracing::error!(%action_id, %url, %reason, "Cannot fetch url");
                self.notify(Notice::FetchFailed {
                    action_id,
                    url: url.clone(),
                    reason: reason.clone(),
                });

                if !self.engine.supports_fetch_failure() {
                    return Ok(());
                }
                let report = self.engine.deliver_fetch_failure(action_id, &reason)?;
                self.ledger.resolve(dispatch);
                self.surface(DeliveryContext::FetchFailure { action_id, url }, report)
            }
            Completion::TimerFired {
                dispatch,
                action_id,
            } => {
                self.ledger.complete(dispatch)?;
                tracing::debug!(%action_id, "Timer fired");
                let report = self.engine.deliver_timeout(action_id)?;
                self.surface(DeliveryContext::Timeout { action_id }, report)
            }
        }
    }

    /// Error channel for delivery results: decode, log, notify, and apply
    /// the configured policy.
    fn surface(
        &mut self,
        context: DeliveryContext,
        raw: Option<RawReport>,
    ) -> Result<(), BridgeError> {
        let Some(raw) = raw else {
            return Ok(());
        };
        let report = self.record_report(&context, &raw)?;
        match self.config.on_engine_error {
            EngineErrorPolicy::Continue => Ok(()),
            EngineErrorPolicy::Abort => Err(BridgeError::EngineReported {
                context: context.to_string(),
                report,
            }),
        }
    }

    fn record_report(
        &mut self,
        context: &DeliveryContext,
        raw: &str,
    ) -> Result<ErrorReport, BridgeError> {
        let report = ErrorReport::decode(raw)?;
        self.engine_errors += 1;
        tracing::error!(
            %context,
            kind = %report.kind,
            message = %report.message,
            "Engine reported error"
        );
        self.notify(Notice::EngineReported {
            context: context.clone(),
            report: report.clone(),
        });
        Ok(report)
    }

    fn notify(&self, notice: Notice) {
        if let Some(tx) = &self.notices {
            // A closed receiver only means nobody is watching any more.
            let _ = tx.send(notice);
        }
    }
}
