use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use rill_core::{AppendFuture, MediaSink, SinkError};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Writes segments to a file in arrival order.
pub struct FileSink {
    file: Arc<Mutex<File>>,
}

impl FileSink {
    /// Create (or truncate) the output file.
    pub async fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path).await?;
        tracing::info!(path = %path.display(), "Writing segments");
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }
}

impl MediaSink for FileSink {
    fn append(&mut self, segment: Vec<u8>) -> AppendFuture {
        let file = Arc::clone(&self.file);
        Box::pin(async move {
            let mut file = file.lock().await;
            file.write_all(&segment).await?;
            tracing::debug!(bytes = segment.len(), "Segment written");
            Ok(())
        })
    }

    fn finalize<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        Box::pin(async move {
            let mut file = self.file.lock().await;
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        })
    }
}
