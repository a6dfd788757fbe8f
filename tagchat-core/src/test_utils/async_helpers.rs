//! Async test helpers
//!
//! Bounded waits on futures, watch channels and discovery streams.

use crate::core_store::{DiscoveryStream, StoreResult, StoredObject};
use futures::StreamExt;
use std::future::Future;
use tokio::sync::watch;
use tokio::time::{timeout, Duration};

/// Default timeout duration for tests (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Helper to assert a future completes within duration
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Future did not complete within {:?}", duration),
    }
}

/// Wait until the watched value satisfies `predicate` and return a copy
///
/// Panics after [`DEFAULT_TEST_TIMEOUT`] or if the sender goes away.
pub async fn wait_for_watch<T, F>(rx: &mut watch::Receiver<T>, mut predicate: F) -> T
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    let wait = async {
        loop {
            {
                let current = rx.borrow_and_update();
                if predicate(&*current) {
                    return (*current).clone();
                }
            }
            if rx.changed().await.is_err() {
                panic!("watch sender dropped before the condition held");
            }
        }
    };
    assert_completes_within(DEFAULT_TEST_TIMEOUT, wait).await
}

/// Take the first `count` items of a discovery stream
pub async fn take_discovered(stream: DiscoveryStream, count: usize) -> Vec<StoreResult<StoredObject>> {
    assert_completes_within(DEFAULT_TEST_TIMEOUT, stream.take(count).collect()).await
}
