use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{EngineError, SinkError};

/// Resolves when the sink has finished consuming one appended segment.
pub type AppendFuture = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'static>>;

/// Rendering side of the pipeline.
///
/// A sink takes one segment at a time. The future returned by `append` is
/// its completion signal; the feeder never calls `append` again until that
/// future has resolved.
pub trait MediaSink: Send {
    fn append(&mut self, segment: Vec<u8>) -> AppendFuture;

    fn finalize<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;
}

/// Single-producer, single-consumer pipe between the engine's segment queue
/// and a [`MediaSink`], with exactly one outstanding append.
pub struct SegmentFeeder {
    sink: Box<dyn MediaSink>,
    in_flight: Option<AppendFuture>,
    appended: usize,
    finalized: bool,
}

impl SegmentFeeder {
    pub fn new(sink: Box<dyn MediaSink>) -> Self {
        Self {
            sink,
            in_flight: None,
            appended: 0,
            finalized: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Segments whose append has completed.
    pub fn appended(&self) -> usize {
        self.appended
    }

    /// Pull at most one segment via `next_segment` and start appending it.
    ///
    /// While an append is outstanding `next_segment` is not called at all,
    /// so the engine keeps the segment queued. Returns whether an append was
    /// started.
    pub fn feed(
        &mut self,
        next_segment: impl FnOnce() -> Result<Option<Vec<u8>>, EngineError>,
    ) -> Result<bool, EngineError> {
        if self.in_flight.is_some() || self.finalized {
            return Ok(false);
        }
        let Some(segment) = next_segment()? else {
            return Ok(false);
        };
        tracing::debug!(bytes = segment.len(), index = self.appended, "Appending segment");
        self.in_flight = Some(self.sink.append(segment));
        Ok(true)
    }

    /// Wait for the outstanding append, if any.
    ///
    /// Cancel-safe: dropping this future leaves the append outstanding.
    pub async fn settle(&mut self) -> Result<(), SinkError> {
        let Some(append) = self.in_flight.as_mut() else {
            return Ok(());
        };
        let result = append.await;
        self.in_flight = None;
        if result.is_ok() {
            self.appended += 1;
        }
        result
    }

    /// Wait for any outstanding append, then close the sink. Idempotent.
    pub async fn finalize(&mut self) -> Result<(), SinkError> {
        if self.finalized {
            return Ok(());
        }
        self.settle().await?;
        self.sink.finalize().await?;
        self.finalized = true;
        Ok(())
    }
}

/// In-memory sink that records segments in completion order.
///
/// Clones share state, so a test can keep one clone and hand the other to a
/// session.
#[derive(Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemorySinkState>>,
    latency: Duration,
}

#[derive(Default)]
struct MemorySinkState {
    segments: Vec<Vec<u8>>,
    outstanding: usize,
    max_outstanding: usize,
    finalized: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each append takes `latency` to complete.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn segments(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .map(|s| s.segments.clone())
            .unwrap_or_default()
    }

    /// Highest number of appends that were ever outstanding at once.
    pub fn max_outstanding(&self) -> usize {
        self.state.lock().map(|s| s.max_outstanding).unwrap_or(0)
    }

    pub fn is_finalized(&self) -> bool {
        self.state.lock().map(|s| s.finalized).unwrap_or(false)
    }
}

impl MediaSink for MemorySink {
    fn append(&mut self, segment: Vec<u8>) -> AppendFuture {
        if let Ok(mut state) = self.state.lock() {
            state.outstanding += 1;
            state.max_outstanding = state.max_outstanding.max(state.outstanding);
        }
        let state = Arc::clone(&self.state);
        let latency = self.latency;
        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let mut state = state
                .lock()
                .map_err(|_| SinkError::Append("sink state poisoned".into()))?;
            state.outstanding -= 1;
            state.segments.push(segment);
            Ok(())
        })
    }

    fn finalize<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self
                .state
                .lock()
                .map_err(|_| SinkError::Finalize("sink state poisoned".into()))?;
            state.finalized = true;
            Ok(())
        })
    }
}
