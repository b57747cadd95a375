use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Clock capability: a signal that fires once after `duration`.
pub trait Timer: Send + Sync {
    fn after(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn after(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_duration() {
        let start = tokio::time::Instant::now();
        TokioTimer.after(Duration::from_millis(500)).await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
