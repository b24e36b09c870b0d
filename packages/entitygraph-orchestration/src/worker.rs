//! Background drain loop for the ingest queue

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::IngestSettings;
use crate::error::Result;
use crate::queue::{DrainReport, IngestQueue};

pub struct IngestWorker {
    queue: Arc<IngestQueue>,
    poll_interval: Duration,
    initial_delay: Duration,
    draining: AtomicBool,
}

/// Clears the draining flag when a pass ends, including on early return
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl IngestWorker {
    pub fn new(queue: Arc<IngestQueue>, settings: &IngestSettings) -> Self {
        Self {
            queue,
            poll_interval: settings.poll_interval().max(Duration::from_millis(1)),
            initial_delay: settings.initial_delay(),
            draining: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &Arc<IngestQueue> {
        &self.queue
    }

    /// One drain pass. `None` when a pass is already running.
    pub async fn tick(&self) -> Result<Option<DrainReport>> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Drain already in progress, skipping tick");
            return Ok(None);
        }
        let _guard = DrainGuard(&self.draining);
        self.queue.poll_and_drain().await.map(Some)
    }

    /// Run until a shutdown signal arrives
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            initial_delay_ms = self.initial_delay.as_millis() as u64,
            "Ingest worker started"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.initial_delay) => {}
            signal = shutdown.recv() => {
                log_shutdown(signal, "Ingest worker stopped before first drain");
                return;
            }
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "Ingest queue drain failed");
                    }
                }
                signal = shutdown.recv() => {
                    log_shutdown(signal, "Ingest worker shutting down");
                    break;
                }
            }
        }
    }

    /// Spawn the loop; send on the returned channel to stop it.
    ///
    /// Dropping every sender also stops the worker, so keep the returned
    /// sender alive for as long as the worker should run.
    pub fn spawn(self: Arc<Self>) -> (JoinHandle<()>, broadcast::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move { self.run(shutdown_rx).await });
        (handle, shutdown_tx)
    }
}

/// Both an explicit signal and a closed channel end the loop
fn log_shutdown(signal: std::result::Result<(), broadcast::error::RecvError>, message: &str) {
    match signal {
        Err(broadcast::error::RecvError::Closed) => {
            warn!("Shutdown channel closed without a signal");
            info!("{}", message);
        }
        _ => info!("{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitygraph_storage::{EntityStore, InMemoryBackend, StoreConfig};

    fn worker() -> IngestWorker {
        let store = EntityStore::new(Arc::new(InMemoryBackend::new()), StoreConfig::default());
        let queue = Arc::new(IngestQueue::new(Arc::new(store)));
        let settings = IngestSettings {
            poll_interval_ms: 10,
            initial_delay_ms: 0,
        };
        IngestWorker::new(queue, &settings)
    }

    #[tokio::test]
    async fn test_tick_skips_while_draining() {
        let worker = worker();
        worker.draining.store(true, Ordering::Release);
        assert_eq!(worker.tick().await.unwrap(), None);

        worker.draining.store(false, Ordering::Release);
        assert_eq!(worker.tick().await.unwrap(), Some(DrainReport::default()));
        assert!(!worker.draining.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let (handle, shutdown) = Arc::new(worker()).spawn();
        shutdown.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropping_sender_stops_worker() {
        let (handle, shutdown) = Arc::new(worker()).spawn();
        drop(shutdown);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
