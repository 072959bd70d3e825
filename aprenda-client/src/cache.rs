//! Query cache
//!
//! Process-wide, key-addressed cache of read results. Results are stored
//! as JSON values so one cache serves every typed read. Concurrent
//! fetches of the same key are deduplicated: the first caller runs the
//! fetch, everyone else waits on its outcome. A failed fetch is handed to
//! every waiter but never cached, so the next read retries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::broadcast;

use aprenda_core::QueryKey;

use crate::error::{ClientError, Result};

type FetchOutcome = std::result::Result<Value, ClientError>;

enum Slot {
    Ready { value: Value, stale: bool },
    Pending { tx: broadcast::Sender<FetchOutcome> },
}

/// Options for one cached read
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// When false the read is skipped entirely: no fetch, no cache write.
    /// Used to defer reads until a dependency (usually the signed-in user
    /// id) is available.
    pub enabled: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions { enabled: true }
    }
}

pub struct QueryCache {
    slots: Mutex<HashMap<QueryKey, Slot>>,
    invalidation_tx: broadcast::Sender<QueryKey>,
}

enum Step {
    Hit(Value),
    Wait(broadcast::Receiver<FetchOutcome>),
    Run(broadcast::Sender<FetchOutcome>),
}

impl QueryCache {
    pub fn new() -> Self {
        let (invalidation_tx, _) = broadcast::channel(64);
        QueryCache {
            slots: Mutex::new(HashMap::new()),
            invalidation_tx,
        }
    }

    /// Read through the cache.
    ///
    /// Returns `Ok(None)` without fetching when `opts.enabled` is false.
    /// Otherwise returns the cached value if fresh, joins an in-flight
    /// fetch for the same key if one exists, or runs `fetch` and stores
    /// its result.
    pub async fn fetch<F, Fut>(
        &self,
        key: QueryKey,
        opts: FetchOptions,
        fetch: F,
    ) -> Result<Option<Value>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        if !opts.enabled {
            return Ok(None);
        }

        let tx = loop {
            let step = {
                let mut slots = self.slots.lock().unwrap();
                let known = match slots.get(&key) {
                    Some(Slot::Ready { value, stale: false }) => Some(Step::Hit(value.clone())),
                    Some(Slot::Pending { tx }) => Some(Step::Wait(tx.subscribe())),
                    // stale or absent: this caller becomes the fetcher
                    _ => None,
                };
                match known {
                    Some(step) => step,
                    None => {
                        let (tx, _) = broadcast::channel(1);
                        slots.insert(key.clone(), Slot::Pending { tx: tx.clone() });
                        Step::Run(tx)
                    }
                }
            };

            match step {
                Step::Hit(value) => return Ok(Some(value)),
                Step::Wait(mut rx) => {
                    if let Ok(outcome) = rx.recv().await {
                        return outcome.map(Some);
                    }
                    // fetcher dropped without reporting; take over
                }
                Step::Run(tx) => break tx,
            }
        };

        let outcome = fetch().await;
        {
            let mut slots = self.slots.lock().unwrap();
            match &outcome {
                Ok(value) => {
                    slots.insert(
                        key,
                        Slot::Ready {
                            value: value.clone(),
                            stale: false,
                        },
                    );
                }
                Err(_) => {
                    slots.remove(&key);
                }
            }
        }
        let _ = tx.send(outcome.clone());
        outcome.map(Some)
    }

    /// Mark every entry whose key starts with `prefix` stale and tell
    /// mounted readers to refetch
    pub fn invalidate(&self, prefix: &QueryKey) {
        {
            let mut slots = self.slots.lock().unwrap();
            for (key, slot) in slots.iter_mut() {
                if key.starts_with(prefix) {
                    if let Slot::Ready { stale, .. } = slot {
                        *stale = true;
                    }
                }
            }
        }
        let _ = self.invalidation_tx.send(prefix.clone());
    }

    /// Subscribe to invalidation prefixes; readers holding live views
    /// refetch the keys that match
    pub fn invalidations(&self) -> broadcast::Receiver<QueryKey> {
        self.invalidation_tx.subscribe()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use aprenda_core::GatewayError;
    use serde_json::json;

    fn counting_fetch(
        calls: Arc<AtomicU32>,
        delay: Duration,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = FetchOutcome> + Send>> {
        move || {
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok(json!(["row"]))
            })
        }
    }

    #[tokio::test]
    async fn test_concurrent_same_key_reads_fetch_once() {
        let cache = Arc::new(QueryCache::new());
        let calls = Arc::new(AtomicU32::new(0));
        let key = QueryKey::root("courses");

        let a = cache.fetch(
            key.clone(),
            FetchOptions::default(),
            counting_fetch(calls.clone(), Duration::from_millis(20)),
        );
        let b = cache.fetch(
            key.clone(),
            FetchOptions::default(),
            counting_fetch(calls.clone(), Duration::from_millis(20)),
        );

        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_value_served_without_refetch() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let key = QueryKey::root("courses");

        for _ in 0..3 {
            cache
                .fetch(
                    key.clone(),
                    FetchOptions::default(),
                    counting_fetch(calls.clone(), Duration::ZERO),
                )
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let key = QueryKey::root("courses");

        let failing_calls = calls.clone();
        let result = cache
            .fetch(key.clone(), FetchOptions::default(), move || async move {
                failing_calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Gateway(GatewayError::Network("down".into())))
            })
            .await;
        assert!(result.is_err());

        cache
            .fetch(
                key,
                FetchOptions::default(),
                counting_fetch(calls.clone(), Duration::ZERO),
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disabled_read_fetches_nothing() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        let result = cache
            .fetch(
                QueryKey::root("profile"),
                FetchOptions { enabled: false },
                counting_fetch(calls.clone(), Duration::ZERO),
            )
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalidate_by_prefix_forces_refetch() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let details = QueryKey::root("courseDetails").push("c1").push("viewer");
        let unrelated = QueryKey::root("courses");

        for key in [details.clone(), unrelated.clone()] {
            cache
                .fetch(
                    key,
                    FetchOptions::default(),
                    counting_fetch(calls.clone(), Duration::ZERO),
                )
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.invalidate(&QueryKey::root("courseDetails").push("c1"));

        cache
            .fetch(
                details,
                FetchOptions::default(),
                counting_fetch(calls.clone(), Duration::ZERO),
            )
            .await
            .unwrap();
        cache
            .fetch(
                unrelated,
                FetchOptions::default(),
                counting_fetch(calls.clone(), Duration::ZERO),
            )
            .await
            .unwrap();

        // the matching key refetched, the unrelated one did not
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalidation_prefix_is_broadcast() {
        let cache = QueryCache::new();
        let mut rx = cache.invalidations();
        let prefix = QueryKey::root("userNotifications").push("u1");

        cache.invalidate(&prefix);

        assert_eq!(rx.recv().await.unwrap(), prefix);
    }
}
