//! Periodic background tasks with cooperative shutdown.
//!
//! Replaces per-record in-process timers with one restartable loop: every
//! tick re-reads what is due from storage, so a restarted process (or a second
//! instance) picks up exactly where the last pass left off.

use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{MissedTickBehavior, interval};

/// Run `task` every `period` until a shutdown signal arrives.
///
/// The first tick fires immediately. Ticks missed while a slow pass was still
/// running are skipped rather than replayed back to back. A pass that is in
/// flight when shutdown is signalled is allowed to finish.
///
/// Returns the number of completed passes.
pub async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut task: F,
) -> u64
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut passes = 0u64;

    tracing::info!(task = name, period_secs = period.as_secs(), "Periodic task started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!(task = name, passes, "Periodic task stopping");
                return passes;
            }
            _ = ticker.tick() => {
                task().await;
                passes += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn runs_until_shutdown() {
        let (tx, rx) = broadcast::channel(1);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let handle = tokio::spawn(run_periodic("test", Duration::from_secs(10), rx, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        tokio::time::sleep(Duration::from_secs(25)).await;
        tx.send(()).ok();

        let passes = handle.await.unwrap_or_default();
        assert_eq!(passes, 3);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn stops_immediately_when_already_signalled() {
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).ok();

        let passes = tokio_test::block_on(run_periodic("test", Duration::from_secs(1), rx, || async {}));
        assert_eq!(passes, 0);
    }
}
