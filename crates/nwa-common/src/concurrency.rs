//! Bounded concurrent execution
//!
//! Helpers that run a batch of futures (or a blocking function over a batch
//! of arguments) concurrently while never having more than `limit` of them in
//! flight. Results are always returned in input order.

use std::future::Future;
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use tokio::sync::Semaphore;
use tokio::task::JoinError;

/// Run futures concurrently, at most `limit` at a time.
///
/// Futures that yield a `Result` keep their errors in place, so a failure in
/// one future does not affect the others.
///
/// ```
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use nwa_common::gather_nice;
///
/// let results = gather_nice((1..=3).map(|i| async move { i * 2 }), 2).await;
/// assert_eq!(results, vec![2, 4, 6]);
/// # });
/// ```
pub async fn gather_nice<I, F>(futures: I, limit: usize) -> Vec<F::Output>
where
    I: IntoIterator<Item = F>,
    F: Future,
{
    let semaphore = Semaphore::new(limit.max(1));
    let semaphore = &semaphore;
    join_all(futures.into_iter().map(|fut| async move {
        let _permit = semaphore.acquire().await;
        fut.await
    }))
    .await
}

/// Like [`gather_nice`], but fails with the first error.
///
/// Futures that are still pending when an error occurs are dropped.
pub async fn try_gather_nice<I, F, T, E>(futures: I, limit: usize) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let semaphore = Semaphore::new(limit.max(1));
    let semaphore = &semaphore;
    try_join_all(futures.into_iter().map(|fut| async move {
        let _permit = semaphore.acquire().await;
        fut.await
    }))
    .await
}

/// Run a blocking `function` on the blocking thread pool for each of `args`,
/// at most `limit` at a time.
///
/// Multi-argument calls are expressed with tuples:
///
/// ```
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use nwa_common::gather_nice_sync;
///
/// let sums = gather_nice_sync(|(a, b): (i32, i32)| a + b, [(1, 1), (2, 2)], 5)
///     .await
///     .unwrap();
/// assert_eq!(sums, vec![2, 4]);
/// # });
/// ```
///
/// Fails with a [`JoinError`] when any invocation panicked.
pub async fn gather_nice_sync<A, R, Fun, I>(
    function: Fun,
    args: I,
    limit: usize,
) -> Result<Vec<R>, JoinError>
where
    I: IntoIterator<Item = A>,
    A: Send + 'static,
    R: Send + 'static,
    Fun: Fn(A) -> R + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let function = Arc::new(function);

    let tasks = args.into_iter().map(|arg| {
        let semaphore = semaphore.clone();
        let function = function.clone();
        async move {
            let _permit = semaphore.acquire_owned().await;
            tokio::task::spawn_blocking(move || function(arg)).await
        }
    });

    join_all(tasks).await.into_iter().collect()
}
