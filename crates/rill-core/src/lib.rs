//! Host-side protocol for driving an I/O-free streaming-playback engine.
//!
//! The engine decides what to fetch and when to append; this crate runs the
//! poll loop that executes those decisions against real capabilities
//! ([`Transport`], [`Timer`], [`MediaSink`]) and feeds the outcomes back
//! through [`PlaybackEngine`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rill_core::{Bridge, BridgeConfig, EngineFactory, HttpConfig, HttpTransport, MemorySink, TokioTimer};
//!
//! # async fn run(factory: &dyn EngineFactory) -> anyhow::Result<()> {
//! let transport = Arc::new(HttpTransport::new(&HttpConfig::default())?);
//! let bridge = Bridge::new(transport, Arc::new(TokioTimer), BridgeConfig::default());
//! let report = bridge
//!     .play(factory, "http://localhost:8080/hls/foo.m3u8", Box::new(MemorySink::new()), None)
//!     .await?;
//! println!("{} segments", report.segments_appended);
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod bridge;
pub mod effects;
pub mod engine;
pub mod error;
pub mod feeder;
pub mod report;
pub mod session;
pub mod timer;
pub mod transport;

pub use action::{Action, ActionId, ActionKind};
pub use bridge::{Bridge, BridgeConfig, EngineErrorPolicy};
pub use effects::EffectState;
pub use engine::{EngineFactory, PlaybackEngine, RawReport};
pub use error::{BridgeError, EngineError, SinkError, TransportError};
pub use feeder::{AppendFuture, MediaSink, MemorySink, SegmentFeeder};
pub use report::{DeliveryContext, ErrorReport, Notice};
pub use session::{Session, SessionOutcome, SessionReport};
pub use timer::{Timer, TokioTimer};
pub use transport::{HttpConfig, HttpTransport, StubTransport, Transport};
