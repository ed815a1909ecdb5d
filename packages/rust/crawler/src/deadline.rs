//! Wall-clock deadline for one crawl.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cancels a token once `limit` has elapsed.
///
/// The timer task lives exactly as long as the guard: dropping the guard on
/// any exit path (success, error, cancellation) aborts it.
#[derive(Debug)]
pub(crate) struct DeadlineGuard {
    timer: JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

impl DeadlineGuard {
    pub(crate) fn arm(limit: Duration, cancel: CancellationToken) -> Self {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let timer = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(limit) => {
                    warn!(?limit, "crawl deadline elapsed, cancelling");
                    flag.store(true, Ordering::SeqCst);
                    cancel.cancel();
                }
            }
        });

        Self { timer, fired }
    }

    /// Whether the deadline (rather than someone else) cancelled the token.
    pub(crate) fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_limit() {
        let cancel = CancellationToken::new();
        let guard = DeadlineGuard::arm(Duration::from_secs(300), cancel.clone());

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(!cancel.is_cancelled());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(cancel.is_cancelled());
        assert!(guard.fired());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_guard_disarms_timer() {
        let cancel = CancellationToken::new();
        let guard = DeadlineGuard::arm(Duration::from_millis(50), cancel.clone());
        drop(guard);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn external_cancel_is_not_a_timeout() {
        let cancel = CancellationToken::new();
        let guard = DeadlineGuard::arm(Duration::from_secs(10), cancel.clone());

        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!guard.fired());
    }
}
