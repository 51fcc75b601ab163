//! Tokio scheduler binding.
//!
//! Spawns a task that calls [`Tick::tick`] on a fixed period. The tick never
//! blocks, so it runs directly on the runtime's worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use esplink_core::Tick;

/// Handle to a running periodic ticker. Dropping it stops the task.
pub struct Ticker {
    period: Duration,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<u64>>,
}

impl Ticker {
    /// Start ticking `target` every `period`. Must be called inside a tokio
    /// runtime.
    pub fn spawn<L>(target: Arc<L>, period: Duration) -> Self
    where
        L: Tick + ?Sized + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut timer = interval(period);
            // A late tick is not worth a burst of catch-up ticks.
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks: u64 = 0;
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = timer.tick() => {
                        target.tick();
                        ticks += 1;
                    }
                }
            }
            debug!(ticks, "Ticker stopped");
            ticks
        });
        info!(period_ms = period.as_millis() as u64, "Ticker started");
        Self {
            period,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stop ticking and wait for the task to finish. Returns how many ticks
    /// were delivered.
    pub async fn stop(mut self) -> u64 {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or(0),
            None => 0,
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct Counter(AtomicU64);

    impl Tick for Counter {
        fn tick(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_ticks_until_stopped() {
        let counter = Arc::new(Counter::default());
        let ticker = Ticker::spawn(Arc::clone(&counter), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(60)).await;
        let delivered = ticker.stop().await;

        let seen = counter.0.load(Ordering::SeqCst);
        assert!(seen >= 2, "only {} ticks", seen);
        assert_eq!(seen, delivered);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_drop_stops_ticking() {
        let counter = Arc::new(Counter::default());
        let ticker = Ticker::spawn(Arc::clone(&counter), Duration::from_millis(5));
        assert_eq!(ticker.period(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(ticker);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let seen = counter.0.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), seen);
    }
}
