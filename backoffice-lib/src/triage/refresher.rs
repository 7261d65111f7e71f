//! Periodic re-classification

use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Runs a callback on a fixed interval until cancelled.
///
/// Classifications are computed against one reading of the clock, so a view
/// left open goes stale as time passes. A `Refresher` re-runs the
/// classification (or any other refresh) periodically. The first tick runs
/// immediately. Dropping the refresher cancels it.
///
/// ```ignore
/// let refresher = Refresher::spawn("payments", Duration::from_secs(60), move || {
///     let payments = payments.clone();
///     async move {
///         if let Ok(triage) = payments.triage(&period).await {
///             render(&triage);
///         }
///     }
/// });
/// ```
pub struct Refresher {
    name: String,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Refresher {
    /// Spawns the refresh loop on the current tokio runtime.
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let name = name.into();
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => {
                        debug!("{}: refresher stopped", task_name);
                        break;
                    }
                    _ = interval.tick() => {
                        debug!("{}: refreshing", task_name);
                        tick().await;
                    }
                }
            }
        });

        Self {
            name,
            token,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a token that stops the refresher when cancelled.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Requests the loop to stop after the current tick.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels the loop and waits for it to finish.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let refresher = Refresher::spawn("test", Duration::from_secs(60), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(150)).await;
        refresher.stop().await;
        let seen = ticks.load(Ordering::SeqCst);
        assert_eq!(seen, 3);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_external_token_cancels() {
        let refresher = Refresher::spawn("test", Duration::from_millis(5), || async {});
        refresher.token().cancel();
        assert!(refresher.is_cancelled());
        refresher.stop().await;
    }
}
