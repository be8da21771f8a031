//! Worker-pool orchestration (`spec.md` §5): partitioned, sequential-per-
//! partition processing with deadline enforcement and failure backoff.

use gcse_core::Error;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Consecutive in-worker failures before the 10-minute backoff sleep
/// (`spec.md` §5).
const FAILURE_STREAK_LIMIT: u32 = 10;
/// The backoff sleep itself (`spec.md` §5).
const FAILURE_SLEEP: Duration = Duration::from_secs(600);

/// Run `worker` over every item in `items`, partitioned by `key_of(item)
/// mod partitions` into independent streams that run concurrently; items
/// within one stream run strictly sequentially (`spec.md` §5).
///
/// Honors the run deadline (checked before claiming each item) and the
/// failure-streak backoff: ten consecutive failures in one partition, or
/// any error classified [`Error::RateLimited`], sleeps [`FAILURE_SLEEP`]
/// unless doing so would cross `deadline`, in which case the partition
/// exits early.
///
/// Returns every failed item paired with its error, matching `spec.md`
/// §7's "pool-level errors aggregate into a single merged error."
pub async fn run_pool<T, W, Fut>(
    items: Vec<T>,
    partitions: usize,
    key_of: impl Fn(&T) -> u64,
    deadline: Instant,
    cancel: CancellationToken,
    worker: W,
) -> Vec<(T, Error)>
where
    T: Clone + Send + 'static,
    W: Fn(T) -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<Output = Result<(), Error>> + Send + 'static,
{
    let partitions = partitions.max(1);
    let mut buckets: Vec<Vec<T>> = (0..partitions).map(|_| Vec::new()).collect();
    for item in items {
        let k = (key_of(&item) as usize) % partitions;
        buckets[k].push(item);
    }

    let mut set: JoinSet<Vec<(T, Error)>> = JoinSet::new();
    for bucket in buckets {
        let worker = worker.clone();
        let cancel = cancel.clone();
        set.spawn(async move { run_partition(bucket, deadline, &cancel, worker).await });
    }

    let mut all_errors = Vec::new();
    while let Some(joined) = set.join_next().await {
        if let Ok(errors) = joined {
            all_errors.extend(errors);
        }
    }
    all_errors
}

async fn run_partition<T, W, Fut>(
    bucket: Vec<T>,
    deadline: Instant,
    cancel: &CancellationToken,
    worker: W,
) -> Vec<(T, Error)>
where
    T: Clone,
    W: Fn(T) -> Fut,
    Fut: std::future::Future<Output = Result<(), Error>>,
{
    let mut errors = Vec::new();
    let mut streak = 0u32;

    for item in bucket {
        if cancel.is_cancelled() || Instant::now() >= deadline {
            break;
        }

        match worker(item.clone()).await {
            Ok(()) => streak = 0,
            Err(err) => {
                let rate_limited = matches!(err, Error::RateLimited);
                streak += 1;
                let hit_limit = streak >= FAILURE_STREAK_LIMIT || rate_limited;
                errors.push((item, err));

                if hit_limit {
                    streak = 0;
                    if Instant::now() + FAILURE_SLEEP >= deadline {
                        break;
                    }
                    tokio::select! {
                        () = tokio::time::sleep(FAILURE_SLEEP) => {},
                        () = cancel.cancelled() => break,
                    }
                }
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn partitions_keep_same_key_sequential_and_collect_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let items: Vec<u64> = vec![1, 2, 3, 4];
        let calls2 = Arc::clone(&calls);

        let deadline = Instant::now() + Duration::from_secs(60);
        let errors = run_pool(
            items,
            2,
            |n| *n,
            deadline,
            CancellationToken::new(),
            move |n: u64| {
                let calls = Arc::clone(&calls2);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if n == 3 {
                        Err(Error::Transient("boom".to_string()))
                    } else {
                        Ok(())
                    }
                }
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, 3);
    }

    #[tokio::test]
    async fn deadline_stops_a_partition_early() {
        let deadline = Instant::now();
        let items = vec![1u64, 2, 3];
        let errors = run_pool(
            items,
            1,
            |_| 0,
            deadline,
            CancellationToken::new(),
            |_n: u64| async { Ok(()) },
        )
        .await;
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_a_partition() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let deadline = Instant::now() + Duration::from_secs(60);
        let items = vec![1u64, 2, 3];
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = Arc::clone(&calls);
        run_pool(items, 1, |_| 0, deadline, cancel, move |_n: u64| {
            let calls = Arc::clone(&calls2);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rate_limited_error_triggers_backoff_without_waiting_full_streak() {
        tokio::time::pause();
        let deadline = Instant::now() + Duration::from_secs(3600);
        let items = vec![1u64];
        let start = Instant::now();
        let errors = run_pool(
            items,
            1,
            |_| 0,
            deadline,
            CancellationToken::new(),
            |_n: u64| async { Err(Error::RateLimited) },
        )
        .await;
        assert_eq!(errors.len(), 1);
        assert!(start.elapsed() >= FAILURE_SLEEP);
    }
}
