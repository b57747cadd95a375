use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::engine::{EngineFactory, PlaybackEngine};
use crate::error::BridgeError;
use crate::feeder::MediaSink;
use crate::report::Notice;
use crate::session::{Session, SessionReport};
use crate::timer::Timer;
use crate::transport::Transport;

/// What to do when a delivery call returns an error report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineErrorPolicy {
    /// Log and notify, then keep polling.
    #[default]
    Continue,
    /// End the session on the first report.
    Abort,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub on_engine_error: EngineErrorPolicy,
}

/// Host capabilities shared by every session: network, clock, policy.
pub struct Bridge {
    transport: Arc<dyn Transport>,
    timer: Arc<dyn Timer>,
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(transport: Arc<dyn Transport>, timer: Arc<dyn Timer>, config: BridgeConfig) -> Self {
        Self {
            transport,
            timer,
            config,
        }
    }

    /// A session around an engine that was created elsewhere.
    pub fn session(&self, engine: Box<dyn PlaybackEngine>, sink: Box<dyn MediaSink>) -> Session {
        Session::new(
            engine,
            sink,
            Arc::clone(&self.transport),
            Arc::clone(&self.timer),
            self.config.clone(),
        )
    }

    /// Play `manifest_url` from start to end of stream.
    ///
    /// Fetches the manifest, creates an engine bound to the URL, starts it,
    /// and runs the poll loop.
    pub async fn play(
        &self,
        factory: &dyn EngineFactory,
        manifest_url: &str,
        sink: Box<dyn MediaSink>,
        notices: Option<UnboundedSender<Notice>>,
    ) -> Result<SessionReport, BridgeError> {
        let manifest = self.transport.fetch(manifest_url).await.map_err(|source| {
            tracing::error!(url = manifest_url, error = %source, "Cannot fetch manifest");
            BridgeError::ManifestFetch {
                url: manifest_url.to_string(),
                source,
            }
        })?;
        tracing::info!(url = manifest_url, bytes = manifest.len(), "Manifest fetched");

        let engine = factory.create(manifest_url)?;
        let mut session = self.session(engine, sink);
        if let Some(tx) = notices {
            session = session.with_notices(tx);
        }

        session.start(manifest_url, &manifest)?;
        session.run().await
    }
}
