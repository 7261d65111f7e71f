//! Background refresh through invalidation

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use log::debug;
use log::warn;
use tokio_util::sync::CancellationToken;

use super::BlastRadius;
use super::Invalidate;
use crate::store::ChangeSource;
use crate::store::EventMask;
use crate::triage::Refresher;

/// Periodically expires the cached views of a set of tables.
///
/// Consumers keep reading through the repositories; after each tick their
/// next read goes to the store. Because polling only ever calls
/// [`Invalidate`], it can be swapped for [`ChangeFollower`] without touching
/// readers. Ticks carry [`BlastRadius::expired`] radii, so a fetch already in
/// flight survives the tick and the next reader joins it.
pub struct Poller {
    refresher: Refresher,
}

impl Poller {
    /// Starts polling. The first invalidation happens one `period` from now.
    pub fn spawn(target: Arc<dyn Invalidate>, tables: &[&str], period: Duration) -> Self {
        let radii: Vec<BlastRadius> = tables.iter().map(|t| BlastRadius::expired(*t)).collect();
        let name = format!("poll {}", tables.join(","));
        let mut first = true;

        let refresher = Refresher::spawn(name, period, move || {
            let skip = std::mem::replace(&mut first, false);
            let target = Arc::clone(&target);
            let radii = radii.clone();
            async move {
                if skip {
                    return;
                }
                for radius in &radii {
                    if let Err(e) = target.invalidate(radius).await {
                        warn!("{}: polling invalidation failed: {}", radius.table, e);
                    }
                }
            }
        });

        Self { refresher }
    }

    pub fn stop(&self) {
        self.refresher.cancel();
    }
}

/// Applies the blast radius of every realtime change of one table.
///
/// Stops when dropped, when [`stop`](Self::stop) is called or when the
/// change stream ends.
pub struct ChangeFollower {
    token: CancellationToken,
}

impl ChangeFollower {
    pub fn spawn(source: &dyn ChangeSource, table: &str, target: Arc<dyn Invalidate>) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let mut changes = source.subscribe(table, EventMask::ALL);
        let table = table.to_string();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    event = changes.next() => {
                        let Some(event) = event else { break };
                        let radius = BlastRadius::of_event(&event);
                        if let Err(e) = target.invalidate(&radius).await {
                            warn!("{}: invalidation after {:?} failed: {}", table, event.kind, e);
                        }
                    }
                }
            }
            debug!("{}: change follower stopped", table);
        });

        Self { token }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for ChangeFollower {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<BlastRadius>>);

    #[async_trait]
    impl Invalidate for Recorder {
        async fn invalidate(&self, radius: &BlastRadius) -> Result<(), Error> {
            self.0.lock().unwrap().push(radius.clone());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_invalidates_each_period() {
        let recorder = Arc::new(Recorder::default());
        let poller = Poller::spawn(recorder.clone(), &["claims", "payments"], Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(recorder.0.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(100)).await;
        poller.stop();
        let seen = recorder.0.lock().unwrap().clone();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], BlastRadius::expired("claims"));
        assert_eq!(seen[1], BlastRadius::expired("payments"));
    }
}
