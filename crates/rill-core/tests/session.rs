//! Poll-loop behaviour against a scripted engine.
//!
//! The scripted engine is a queue of canned JSON actions and segments, plus
//! reactions keyed by action id that fire when the bridge delivers an
//! outcome. Every call the bridge makes is recorded for assertions.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rill_core::{
    ActionId, Bridge, BridgeConfig, BridgeError, EffectState, EngineError, EngineErrorPolicy,
    EngineFactory, MemorySink, Notice, PlaybackEngine, RawReport, SessionOutcome, StubTransport,
    TokioTimer, Transport, TransportError,
};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Start(Vec<u8>),
    FetchResult(i64, Vec<u8>),
    FetchFailure(i64, String),
    FetchTiming(i64, u64),
    Timeout(i64),
    NextAction,
    NextSegment,
}

#[derive(Default, Clone)]
struct Reaction {
    actions: Vec<String>,
    segments: Vec<Vec<u8>>,
    report: Option<String>,
}

#[derive(Default)]
struct Script {
    actions: VecDeque<String>,
    segments: VecDeque<Vec<u8>>,
    on_fetch: HashMap<i64, Reaction>,
    on_timeout: HashMap<i64, Reaction>,
    start_report: Option<String>,
    accepts_fetch_failures: bool,
    accepts_fetch_timings: bool,
    calls: Vec<Call>,
}

impl Script {
    fn react(&mut self, reaction: Option<Reaction>) -> Option<RawReport> {
        let reaction = reaction.unwrap_or_default();
        self.actions.extend(reaction.actions);
        self.segments.extend(reaction.segments);
        reaction.report
    }
}

#[derive(Clone, Default)]
struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    fn with(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    fn deliveries(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::NextAction | Call::NextSegment))
            .collect()
    }
}

impl PlaybackEngine for ScriptedEngine {
    fn start(&mut self, manifest: &[u8]) -> Result<Option<RawReport>, EngineError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Start(manifest.to_vec()));
        Ok(script.start_report.clone())
    }

    fn deliver_fetch_result(
        &mut self,
        action_id: ActionId,
        bytes: &[u8],
    ) -> Result<Option<RawReport>, EngineError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::FetchResult(action_id.0, bytes.to_vec()));
        let reaction = script.on_fetch.remove(&action_id.0);
        Ok(script.react(reaction))
    }

    fn deliver_timeout(&mut self, action_id: ActionId) -> Result<Option<RawReport>, EngineError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Timeout(action_id.0));
        let reaction = script.on_timeout.remove(&action_id.0);
        Ok(script.react(reaction))
    }

    fn supports_fetch_failure(&self) -> bool {
        self.script.lock().unwrap().accepts_fetch_failures
    }

    fn deliver_fetch_failure(
        &mut self,
        action_id: ActionId,
        reason: &str,
    ) -> Result<Option<RawReport>, EngineError> {
        let mut script = self.script.lock().unwrap();
        script
            .calls
            .push(Call::FetchFailure(action_id.0, reason.to_string()));
        Ok(None)
    }

    fn supports_fetch_timing(&self) -> bool {
        self.script.lock().unwrap().accepts_fetch_timings
    }

    fn deliver_fetch_timing(
        &mut self,
        action_id: ActionId,
        elapsed: Duration,
    ) -> Result<Option<RawReport>, EngineError> {
        let mut script = self.script.lock().unwrap();
        script
            .calls
            .push(Call::FetchTiming(action_id.0, elapsed.as_millis() as u64));
        Ok(None)
    }

    fn next_action(&mut self) -> Result<Option<String>, EngineError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::NextAction);
        Ok(script.actions.pop_front())
    }

    fn next_segment(&mut self) -> Result<Option<Vec<u8>>, EngineError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::NextSegment);
        Ok(script.segments.pop_front())
    }
}

struct ScriptedFactory {
    engine: ScriptedEngine,
    created_with: Mutex<Vec<String>>,
}

impl EngineFactory for ScriptedFactory {
    fn create(&self, manifest_url: &str) -> Result<Box<dyn PlaybackEngine>, EngineError> {
        self.created_with
            .lock()
            .unwrap()
            .push(manifest_url.to_string());
        Ok(Box::new(self.engine.clone()))
    }
}

/// Transport whose responses take a per-URL amount of (tokio) time.
struct DelayedTransport {
    delays: HashMap<String, Duration>,
}

impl Transport for DelayedTransport {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let delay = self.delays.get(url).copied().unwrap_or_default();
            tokio::time::sleep(delay).await;
            Ok(url.as_bytes().to_vec())
        })
    }
}

fn fetch(id: i64, url: &str) -> String {
    format!(r#"{{"type":"Fetch","action_id":{id},"url":"{url}"}}"#)
}

fn set_timeout(id: i64, duration_ms: u64) -> String {
    format!(r#"{{"type":"SetTimeout","action_id":{id},"duration_ms":{duration_ms}}}"#)
}

fn bridge(transport: impl Transport + 'static, policy: EngineErrorPolicy) -> Bridge {
    Bridge::new(
        Arc::new(transport),
        Arc::new(TokioTimer),
        BridgeConfig {
            on_engine_error: policy,
        },
    )
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn manifest_fetch_then_two_segments_are_appended_in_order() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([fetch(1, "manifest.m3u8")]),
        on_fetch: HashMap::from([(
            1,
            Reaction {
                segments: vec![b"S0".to_vec(), b"S1".to_vec()],
                ..Reaction::default()
            },
        )]),
        ..Script::default()
    });
    let transport = StubTransport::new().with_body("manifest.m3u8", b"#EXTM3U...".to_vec());
    let sink = MemorySink::with_latency(Duration::from_millis(20));

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let mut session = bridge.session(Box::new(engine.clone()), Box::new(sink.clone()));
    let report = session.run().await.unwrap();

    assert_eq!(
        engine.deliveries(),
        vec![Call::FetchResult(1, b"#EXTM3U...".to_vec())]
    );
    assert_eq!(sink.segments(), vec![b"S0".to_vec(), b"S1".to_vec()]);
    assert_eq!(sink.max_outstanding(), 1);
    assert!(sink.is_finalized());
    assert_eq!(report.outcome, SessionOutcome::Finished);
    assert_eq!(report.segments_appended, 2);
    assert_eq!(report.actions_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_error_report_is_logged_and_polling_continues() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([set_timeout(2, 500)]),
        on_timeout: HashMap::from([(
            2,
            Reaction {
                actions: vec![fetch(4, "seg4.ts")],
                report: Some(r#"{"kind":"Expired","message":"playlist is stale"}"#.into()),
                ..Reaction::default()
            },
        )]),
        on_fetch: HashMap::from([(
            4,
            Reaction {
                segments: vec![b"S4".to_vec()],
                ..Reaction::default()
            },
        )]),
        ..Script::default()
    });
    let transport = StubTransport::new().with_body("seg4.ts", b"ts-bytes".to_vec());
    let sink = MemorySink::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let started = tokio::time::Instant::now();
    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let mut session = bridge
        .session(Box::new(engine.clone()), Box::new(sink.clone()))
        .with_notices(tx);
    let report = session.run().await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(
        engine.deliveries(),
        vec![Call::Timeout(2), Call::FetchResult(4, b"ts-bytes".to_vec())]
    );
    match rx.try_recv().unwrap() {
        Notice::EngineReported { report, .. } => assert_eq!(report.kind, "Expired"),
        other => panic!("unexpected notice: {other:?}"),
    }
    assert_eq!(report.engine_errors, 1);
    assert_eq!(report.outcome, SessionOutcome::Finished);
    assert_eq!(sink.segments(), vec![b"S4".to_vec()]);
}

#[tokio::test]
async fn unknown_action_is_skipped_and_queue_keeps_draining() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([
            r#"{"type":"Unknown","action_id":3}"#.to_string(),
            fetch(5, "b"),
        ]),
        ..Script::default()
    });
    let transport = StubTransport::new().with_body("b", b"body".to_vec());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let mut session = bridge
        .session(Box::new(engine.clone()), Box::new(MemorySink::new()))
        .with_notices(tx);
    session.run().await.unwrap();

    assert!(matches!(rx.try_recv(), Ok(Notice::UnknownAction { .. })));
    assert_eq!(
        engine.deliveries(),
        vec![Call::FetchResult(5, b"body".to_vec())]
    );
}

// ── Properties ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_result_carries_action_id_and_exact_bytes() {
    let payload: Vec<u8> = (0..=255u8).collect();
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([fetch(7, "a")]),
        ..Script::default()
    });
    let transport = StubTransport::new().with_body("a", payload.clone());

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let mut session = bridge.session(Box::new(engine.clone()), Box::new(MemorySink::new()));
    session.run().await.unwrap();

    assert_eq!(engine.deliveries(), vec![Call::FetchResult(7, payload)]);
}

#[tokio::test]
async fn pump_without_work_has_no_effect() {
    let engine = ScriptedEngine::default();
    let sink = MemorySink::new();
    let transport = StubTransport::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let mut session = bridge
        .session(Box::new(engine.clone()), Box::new(sink.clone()))
        .with_notices(tx);

    session.pump().unwrap();
    session.pump().unwrap();

    assert_eq!(
        engine.calls(),
        vec![
            Call::NextSegment,
            Call::NextAction,
            Call::NextSegment,
            Call::NextAction
        ]
    );
    assert_eq!(session.in_flight(), 0);
    assert!(sink.segments().is_empty());
    assert!(!sink.is_finalized());
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn busy_sink_is_never_asked_for_a_second_segment() {
    let engine = ScriptedEngine::with(Script {
        segments: VecDeque::from([b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]),
        ..Script::default()
    });
    let sink = MemorySink::with_latency(Duration::from_millis(100));

    let bridge = bridge(StubTransport::new(), EngineErrorPolicy::Continue);
    let mut session = bridge.session(Box::new(engine.clone()), Box::new(sink.clone()));

    session.pump().unwrap();
    session.pump().unwrap();
    let pulls = engine
        .calls()
        .iter()
        .filter(|c| **c == Call::NextSegment)
        .count();
    assert_eq!(pulls, 1, "second pump must not pull while the append is outstanding");

    session.run().await.unwrap();
    assert_eq!(
        sink.segments(),
        vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]
    );
    assert_eq!(sink.max_outstanding(), 1);
}

#[tokio::test(start_paused = true)]
async fn completions_may_arrive_out_of_dispatch_order() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([fetch(1, "slow"), set_timeout(2, 10)]),
        ..Script::default()
    });
    let transport = DelayedTransport {
        delays: HashMap::from([("slow".to_string(), Duration::from_secs(5))]),
    };

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let mut session = bridge.session(Box::new(engine.clone()), Box::new(MemorySink::new()));

    session.pump().unwrap();
    assert_eq!(session.effect_state(ActionId(1)), Some(EffectState::InFlight));
    assert_eq!(session.effect_state(ActionId(2)), Some(EffectState::InFlight));

    session.run().await.unwrap();
    assert_eq!(
        engine.deliveries(),
        vec![Call::Timeout(2), Call::FetchResult(1, b"slow".to_vec())]
    );
    assert_eq!(session.effect_state(ActionId(1)), None);
}

// ── Error handling ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn abort_policy_ends_session_on_first_report() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([set_timeout(2, 10), set_timeout(3, 1_000)]),
        on_timeout: HashMap::from([(
            2,
            Reaction {
                report: Some(r#"{"kind":"Expired","message":"gone"}"#.into()),
                ..Reaction::default()
            },
        )]),
        ..Script::default()
    });

    let bridge = bridge(StubTransport::new(), EngineErrorPolicy::Abort);
    let mut session = bridge.session(Box::new(engine.clone()), Box::new(MemorySink::new()));
    let err = session.run().await.unwrap_err();

    match err {
        BridgeError::EngineReported { report, .. } => assert_eq!(report.kind, "Expired"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!engine.deliveries().contains(&Call::Timeout(3)));
}

#[tokio::test]
async fn fetch_failure_is_forwarded_when_engine_accepts_it() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([fetch(9, "missing.ts")]),
        accepts_fetch_failures: true,
        ..Script::default()
    });
    let transport = StubTransport::new().with_failure("missing.ts", "connection reset");
    let (tx, mut rx) = mpsc::unbounded_channel();

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let mut session = bridge
        .session(Box::new(engine.clone()), Box::new(MemorySink::new()))
        .with_notices(tx);
    let report = session.run().await.unwrap();

    assert_eq!(
        engine.deliveries(),
        vec![Call::FetchFailure(
            9,
            "request failed: connection reset".into()
        )]
    );
    assert!(matches!(rx.try_recv(), Ok(Notice::FetchFailed { .. })));
    assert_eq!(report.outcome, SessionOutcome::Finished);
}

#[tokio::test]
async fn fetch_failure_without_failure_hook_stalls_the_session() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([fetch(9, "missing.ts")]),
        ..Script::default()
    });
    let sink = MemorySink::new();

    let bridge = bridge(StubTransport::new(), EngineErrorPolicy::Continue);
    let mut session = bridge.session(Box::new(engine.clone()), Box::new(sink.clone()));
    let report = session.run().await.unwrap();

    assert!(engine.deliveries().is_empty(), "no success may be synthesized");
    assert_eq!(
        report.outcome,
        SessionOutcome::Stalled {
            unresolved: vec![ActionId(9)]
        }
    );
    assert_eq!(session.effect_state(ActionId(9)), Some(EffectState::Failed));
    assert!(!sink.is_finalized());
}

#[tokio::test]
async fn malformed_action_json_is_fatal() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from(["{oops".to_string(), fetch(1, "a")]),
        ..Script::default()
    });

    let bridge = bridge(StubTransport::new(), EngineErrorPolicy::Continue);
    let mut session = bridge.session(Box::new(engine.clone()), Box::new(MemorySink::new()));
    let err = session.run().await.unwrap_err();

    assert!(err.is_protocol());
    assert_eq!(session.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn malformed_report_is_fatal_even_when_continuing() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([set_timeout(1, 5)]),
        on_timeout: HashMap::from([(
            1,
            Reaction {
                report: Some("not json".into()),
                ..Reaction::default()
            },
        )]),
        ..Script::default()
    });

    let bridge = bridge(StubTransport::new(), EngineErrorPolicy::Continue);
    let mut session = bridge.session(Box::new(engine), Box::new(MemorySink::new()));
    let err = session.run().await.unwrap_err();

    assert!(matches!(err, BridgeError::MalformedReport { .. }));
}

#[tokio::test(start_paused = true)]
async fn repeated_action_id_delivers_both_outcomes() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([fetch(1, "a"), set_timeout(1, 10)]),
        ..Script::default()
    });
    let transport = StubTransport::new().with_body("a", b"A".to_vec());
    let sink = MemorySink::new();

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let mut session = bridge.session(Box::new(engine.clone()), Box::new(sink.clone()));
    let report = session.run().await.unwrap();

    assert_eq!(
        engine.deliveries(),
        vec![Call::FetchResult(1, b"A".to_vec()), Call::Timeout(1)]
    );
    assert_eq!(report.outcome, SessionOutcome::Finished);
    assert_eq!(report.actions_completed, 2);
    assert!(sink.is_finalized());
}

#[tokio::test]
async fn failed_fetch_is_not_forgotten_when_its_id_is_reused() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([fetch(3, "missing.ts"), fetch(3, "present.ts")]),
        ..Script::default()
    });
    let transport = StubTransport::new().with_body("present.ts", b"P".to_vec());
    let sink = MemorySink::new();

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let mut session = bridge.session(Box::new(engine.clone()), Box::new(sink.clone()));
    let report = session.run().await.unwrap();

    assert_eq!(engine.deliveries(), vec![Call::FetchResult(3, b"P".to_vec())]);
    assert_eq!(
        report.outcome,
        SessionOutcome::Stalled {
            unresolved: vec![ActionId(3)]
        }
    );
    assert!(!sink.is_finalized());
}

#[tokio::test]
async fn negative_action_ids_round_trip() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([fetch(-7, "a")]),
        ..Script::default()
    });
    let transport = StubTransport::new().with_body("a", b"A".to_vec());

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let mut session = bridge.session(Box::new(engine.clone()), Box::new(MemorySink::new()));
    session.run().await.unwrap();

    assert_eq!(engine.deliveries(), vec![Call::FetchResult(-7, b"A".to_vec())]);
}

#[tokio::test(start_paused = true)]
async fn fetch_duration_is_delivered_before_the_bytes() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([fetch(7, "seg7.ts")]),
        accepts_fetch_timings: true,
        ..Script::default()
    });
    let transport = DelayedTransport {
        delays: HashMap::from([("seg7.ts".to_string(), Duration::from_millis(40))]),
    };

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let mut session = bridge.session(Box::new(engine.clone()), Box::new(MemorySink::new()));
    session.run().await.unwrap();

    assert_eq!(
        engine.deliveries(),
        vec![
            Call::FetchTiming(7, 40),
            Call::FetchResult(7, b"seg7.ts".to_vec()),
        ]
    );
}

#[tokio::test]
async fn fetch_duration_is_not_delivered_without_timing_hook() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([fetch(7, "seg7.ts")]),
        ..Script::default()
    });
    let transport = StubTransport::new().with_body("seg7.ts", b"S".to_vec());

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let mut session = bridge.session(Box::new(engine.clone()), Box::new(MemorySink::new()));
    session.run().await.unwrap();

    assert!(
        !engine
            .deliveries()
            .iter()
            .any(|c| matches!(c, Call::FetchTiming(..)))
    );
}

// ── play() ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn play_fetches_manifest_then_creates_and_starts_engine() {
    let engine = ScriptedEngine::with(Script {
        actions: VecDeque::from([fetch(1, "http://cdn/low/index.m3u8")]),
        on_fetch: HashMap::from([(
            1,
            Reaction {
                segments: vec![b"init".to_vec(), b"media".to_vec()],
                ..Reaction::default()
            },
        )]),
        ..Script::default()
    });
    let factory = ScriptedFactory {
        engine: engine.clone(),
        created_with: Mutex::new(Vec::new()),
    };
    let transport = StubTransport::new()
        .with_body("http://cdn/master.m3u8", b"#EXTM3U master".to_vec())
        .with_body("http://cdn/low/index.m3u8", b"#EXTM3U media".to_vec());
    let sink = MemorySink::new();

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let report = bridge
        .play(&factory, "http://cdn/master.m3u8", Box::new(sink.clone()), None)
        .await
        .unwrap();

    assert_eq!(
        *factory.created_with.lock().unwrap(),
        vec!["http://cdn/master.m3u8".to_string()]
    );
    assert_eq!(
        engine.deliveries(),
        vec![
            Call::Start(b"#EXTM3U master".to_vec()),
            Call::FetchResult(1, b"#EXTM3U media".to_vec()),
        ]
    );
    assert_eq!(sink.segments(), vec![b"init".to_vec(), b"media".to_vec()]);
    assert_eq!(report.outcome, SessionOutcome::Finished);
}

#[tokio::test]
async fn play_stops_when_start_reports_an_error() {
    let engine = ScriptedEngine::with(Script {
        start_report: Some(r#"{"kind":"InvalidInput","reason":"not a playlist"}"#.into()),
        actions: VecDeque::from([fetch(1, "never")]),
        ..Script::default()
    });
    let factory = ScriptedFactory {
        engine: engine.clone(),
        created_with: Mutex::new(Vec::new()),
    };
    let transport = StubTransport::new().with_body("http://cdn/master.m3u8", b"garbage".to_vec());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let err = bridge
        .play(
            &factory,
            "http://cdn/master.m3u8",
            Box::new(MemorySink::new()),
            Some(tx),
        )
        .await
        .unwrap_err();

    match err {
        BridgeError::EngineReported { report, .. } => {
            assert_eq!(report.kind, "InvalidInput");
            assert_eq!(report.message, "not a playlist");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(rx.try_recv(), Ok(Notice::EngineReported { .. })));
    assert!(!engine.calls().contains(&Call::NextAction));
}

#[tokio::test]
async fn play_reports_manifest_fetch_failure_without_creating_engine() {
    let factory = ScriptedFactory {
        engine: ScriptedEngine::default(),
        created_with: Mutex::new(Vec::new()),
    };
    let transport = StubTransport::new().with_failure("http://cdn/master.m3u8", "timed out");

    let bridge = bridge(transport, EngineErrorPolicy::Continue);
    let err = bridge
        .play(
            &factory,
            "http://cdn/master.m3u8",
            Box::new(MemorySink::new()),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::ManifestFetch { ref url, .. } if url == "http://cdn/master.m3u8"));
    assert!(factory.created_with.lock().unwrap().is_empty());
}
