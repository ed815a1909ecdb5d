//! Bounded-concurrency worker pool over a shared work queue.
//!
//! The pool knows nothing about sitemaps: it pre-loads a queue, starts
//! `min(width, items)` workers that each pop and process one item at a time,
//! and returns once every worker has stopped.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;

// ---------------------------------------------------------------------------
// WorkQueue
// ---------------------------------------------------------------------------

/// FIFO queue shared by the workers of one pool.
///
/// Workers run as parallel tasks, so every access goes through the lock:
/// "check empty, then take" is a single [`pop`](WorkQueue::pop).
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> WorkQueue<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().collect()),
        }
    }

    /// Take the next item, or `None` once the queue is drained.
    pub async fn pop(&self) -> Option<T> {
        self.items.lock().await.pop_front()
    }

    /// Drop every pending item so workers stop after their current one.
    /// Returns how many items were dropped.
    pub async fn close(&self) -> usize {
        let mut items = self.items.lock().await;
        let dropped = items.len();
        items.clear();
        dropped
    }
}

// ---------------------------------------------------------------------------
// run_pool
// ---------------------------------------------------------------------------

/// Run `work` over every item with at most `width` concurrent workers.
///
/// A `width` of zero is treated as one. With width 1 items are processed in
/// queue order. The first `Err` returned by `work` closes the queue; the pool
/// still waits for in-flight items and then returns that error. A panicking
/// worker is resumed on the caller.
pub async fn run_pool<T, F, Fut, E>(items: Vec<T>, width: usize, work: F) -> Result<(), E>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    if items.is_empty() {
        return Ok(());
    }

    let workers = width.max(1).min(items.len());
    let queue = Arc::new(WorkQueue::new(items));
    let work = Arc::new(work);

    let mut set = JoinSet::new();
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let work = Arc::clone(&work);
        set.spawn(async move {
            while let Some(item) = queue.pop().await {
                if let Err(e) = work(item).await {
                    queue.close().await;
                    return Err(e);
                }
            }
            Ok(())
        });
    }

    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(join_error) if join_error.is_panic() => {
                std::panic::resume_unwind(join_error.into_panic());
            }
            // Tasks are only aborted when this future is dropped.
            Err(_) => {}
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn queue_pops_in_fifo_order() {
        let queue = WorkQueue::new(vec!["a", "b"]);
        assert_eq!(queue.pop().await, Some("a"));
        assert_eq!(queue.pop().await, Some("b"));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn close_drops_pending_items() {
        let queue = WorkQueue::new(1..=5);
        queue.pop().await;
        assert_eq!(queue.close().await, 4);
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn every_item_processed_exactly_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        run_pool((0..50).collect(), 4, move |n: u32| {
            let sink = Arc::clone(&sink);
            async move {
                tokio::task::yield_now().await;
                sink.lock().await.push(n);
                Ok::<_, ()>(())
            }
        })
        .await
        .unwrap();

        let mut seen = seen.lock().await.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_width_or_items() {
        async fn max_in_flight(items: usize, width: usize) -> usize {
            let current = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let (c, p) = (Arc::clone(&current), Arc::clone(&peak));

            run_pool(vec![(); items], width, move |()| {
                let (current, peak) = (Arc::clone(&c), Arc::clone(&p));
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ()>(())
                }
            })
            .await
            .unwrap();

            peak.load(Ordering::SeqCst)
        }

        assert!(max_in_flight(20, 3).await <= 3);
        assert!(max_in_flight(2, 8).await <= 2);
        assert_eq!(max_in_flight(4, 0).await, 1);
    }

    #[tokio::test]
    async fn width_one_preserves_queue_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        run_pool(vec!["c", "a", "b"], 1, move |s: &'static str| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().await.push(s);
                Ok::<_, ()>(())
            }
        })
        .await
        .unwrap();

        assert_eq!(*seen.lock().await, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn first_error_stops_the_pool() {
        let processed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&processed);

        let result = run_pool((1..=10).collect(), 1, move |n: u32| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if n == 3 { Err(format!("item {n} failed")) } else { Ok(()) }
            }
        })
        .await;

        assert_eq!(result, Err("item 3 failed".to_string()));
        assert_eq!(processed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_input_returns_immediately() {
        let result = run_pool(Vec::<u8>::new(), 8, |_| async { Err::<(), _>("never called") }).await;
        assert!(result.is_ok());
    }
}
