//! Keyed query cache with request deduplication, stale-while-revalidate
//! reads and prefix invalidation.
//!
//! # Design
//! Each entry owns a `watch` channel carrying its current [`QueryState`];
//! a [`Subscription`] is a receiver of that channel, so "has active
//! subscribers" is simply `receiver_count() > 0`. Fetches run as spawned
//! tasks that write their outcome back into the entry.
//!
//! Every issued fetch is stamped with a generation number drawn from a
//! cache-wide counter. An outcome is applied only if the entry still
//! carries the generation it was issued with, so the last-issued fetch wins
//! even when responses arrive out of order. Invalidation always takes a new
//! generation, which also orphans any fetch that was in flight.
//!
//! Freshness is boolean: an entry stays fresh until it is invalidated or the
//! cache is cleared. Entries are never evicted.
//!
//! The map lock is never held across an await point, and fetchers are
//! invoked after it is released.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::key::QueryKey;

/// A stored fetcher, re-invoked on revalidation.
pub type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, ApiError>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No value yet; the first fetch is outstanding.
    Loading,
    Fresh,
    /// Invalidated. A cached value may still be present and is served as-is.
    Stale,
    /// The last fetch failed. The next read fetches again.
    Error,
}

/// Snapshot of one cache entry, as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<V> {
    pub data: Option<V>,
    pub freshness: Freshness,
    pub error: Option<ApiError>,
    pub is_fetching: bool,
}

impl<V> QueryState<V> {
    fn loading() -> Self {
        Self {
            data: None,
            freshness: Freshness::Loading,
            error: None,
            is_fetching: true,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.freshness == Freshness::Loading
    }

    /// Project the cached value, keeping freshness and error untouched.
    pub fn map<U>(self, f: impl FnOnce(V) -> Option<U>) -> QueryState<U> {
        QueryState {
            data: self.data.and_then(f),
            freshness: self.freshness,
            error: self.error,
            is_fetching: self.is_fetching,
        }
    }
}

impl<V: Clone> QueryState<V> {
    /// The settled outcome, or `None` while a fetch is still outstanding.
    pub fn outcome(&self) -> Option<Result<V, ApiError>> {
        if self.is_fetching {
            return None;
        }
        match self.freshness {
            Freshness::Error => self.error.clone().map(Err),
            _ => self.data.clone().map(Ok),
        }
    }
}

struct Entry<V> {
    state: watch::Sender<QueryState<V>>,
    generation: u64,
    fetcher: Fetcher<V>,
}

struct Inner<V> {
    entries: HashMap<QueryKey, Entry<V>>,
    next_generation: u64,
}

impl<V> Inner<V> {
    fn generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

struct FetchJob<V> {
    key: QueryKey,
    generation: u64,
    fetcher: Fetcher<V>,
}

/// Shared query cache. Clones refer to the same entries.
///
/// Reads spawn their fetches with `tokio::spawn`, so they must be issued
/// from within a tokio runtime.
pub struct QueryCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                next_generation: 0,
            })),
        }
    }
}

impl<V> std::fmt::Debug for QueryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache").field("entries", &self.len()).finish()
    }
}

impl<V: Clone + Send + Sync + 'static> QueryCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `key`, fetching it with `fetcher` if needed.
    ///
    /// - absent: fetch, state `Loading`;
    /// - fetch already outstanding: attach to it;
    /// - fresh: served from cache, `fetcher` is not invoked;
    /// - stale or failed: the cached value (if any) is served immediately
    ///   and a background fetch is started.
    ///
    /// The given `fetcher` replaces the stored one either way.
    pub fn read<F, Fut>(&self, key: QueryKey, fetcher: F) -> Subscription<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let fetcher: Fetcher<V> = Arc::new(move || fetcher().boxed());
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let generation = inner.generation();

        let (receiver, job) = match inner.entries.get_mut(&key) {
            Some(entry) => {
                entry.fetcher = fetcher;
                let receiver = entry.state.subscribe();
                let (freshness, fetching) = {
                    let state = entry.state.borrow();
                    (state.freshness, state.is_fetching)
                };
                let job = if fetching {
                    debug!(key = %key, "attaching to in-flight fetch");
                    None
                } else if freshness == Freshness::Fresh {
                    debug!(key = %key, "serving fresh entry");
                    None
                } else {
                    Some(begin(&key, entry, generation))
                };
                (receiver, job)
            }
            None => {
                let (state, receiver) = watch::channel(QueryState::loading());
                let entry = Entry {
                    state,
                    generation,
                    fetcher: Arc::clone(&fetcher),
                };
                inner.entries.insert(key.clone(), entry);
                let job = FetchJob {
                    key: key.clone(),
                    generation,
                    fetcher,
                };
                (receiver, Some(job))
            }
        };
        drop(guard);

        if let Some(job) = job {
            self.spawn(job);
        }
        Subscription { key, receiver }
    }

    /// Read `key` and wait for the settled outcome.
    pub async fn fetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<V, ApiError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        self.read(key, fetcher).settled().await
    }

    /// Mark every entry under `prefix` stale and return how many matched.
    ///
    /// Matching entries with live subscriptions refetch right away; the rest
    /// refetch on their next read. Any fetch already in flight for a
    /// matching entry is superseded.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut matched = 0;
        let mut jobs = Vec::new();
        {
            let mut inner = self.inner.lock();
            let Inner {
                entries,
                next_generation,
            } = &mut *inner;
            for (key, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
                matched += 1;
                *next_generation += 1;
                let generation = *next_generation;
                if entry.state.receiver_count() > 0 {
                    jobs.push(begin(key, entry, generation));
                } else {
                    entry.generation = generation;
                    entry.state.send_modify(|state| {
                        state.freshness = Freshness::Stale;
                        state.is_fetching = false;
                    });
                }
            }
        }
        debug!(prefix = %prefix, matched, refetching = jobs.len(), "invalidated");
        for job in jobs {
            self.spawn(job);
        }
        matched
    }

    /// Re-issue the stored fetcher for `key`, superseding any fetch in
    /// flight. Returns `false` if the key has never been read.
    pub fn refetch(&self, key: &QueryKey) -> bool {
        let job = {
            let mut inner = self.inner.lock();
            let generation = inner.generation();
            match inner.entries.get_mut(key) {
                Some(entry) => begin(key, entry, generation),
                None => return false,
            }
        };
        self.spawn(job);
        true
    }

    /// Current snapshot for `key`, without subscribing.
    pub fn peek(&self, key: &QueryKey) -> Option<QueryState<V>> {
        let inner = self.inner.lock();
        inner.entries.get(key).map(|entry| entry.state.borrow().clone())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        let inner = self.inner.lock();
        inner.entries.get(key).map_or(0, |entry| entry.state.receiver_count())
    }

    /// Drop every entry. Outstanding subscriptions settle as `Cancelled`
    /// and fetches still in flight are ignored when they complete.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        debug!(dropped, "cleared query cache");
    }

    fn spawn(&self, job: FetchJob<V>) {
        debug!(key = %job.key, generation = job.generation, "starting fetch");
        let future = (job.fetcher)();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = future.await;
            settle(&inner, &job.key, job.generation, outcome);
        });
    }
}

impl<V> QueryCache<V> {
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stamp `entry` with `generation` and mark it fetching.
fn begin<V>(key: &QueryKey, entry: &mut Entry<V>, generation: u64) -> FetchJob<V> {
    entry.generation = generation;
    entry.state.send_modify(|state| {
        state.is_fetching = true;
        state.freshness = if state.data.is_some() {
            Freshness::Stale
        } else {
            Freshness::Loading
        };
    });
    FetchJob {
        key: key.clone(),
        generation,
        fetcher: Arc::clone(&entry.fetcher),
    }
}

fn settle<V>(inner: &Mutex<Inner<V>>, key: &QueryKey, generation: u64, outcome: Result<V, ApiError>) {
    let inner = inner.lock();
    let Some(entry) = inner.entries.get(key) else {
        debug!(key = %key, generation, "entry gone; dropping response");
        return;
    };
    if entry.generation != generation {
        debug!(key = %key, generation, current = entry.generation, "discarding superseded response");
        return;
    }
    entry.state.send_modify(|state| {
        state.is_fetching = false;
        match outcome {
            Ok(value) => {
                state.data = Some(value);
                state.freshness = Freshness::Fresh;
                state.error = None;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "fetch failed");
                state.freshness = Freshness::Error;
                state.error = Some(err);
            }
        }
    });
}

/// A live view of one cache entry.
///
/// Dropping it unsubscribes; the entry is then refetched lazily instead of
/// on invalidation.
#[derive(Debug)]
pub struct Subscription<V> {
    key: QueryKey,
    receiver: watch::Receiver<QueryState<V>>,
}

impl<V: Clone> Subscription<V> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn current(&self) -> QueryState<V> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next snapshot. Returns `false` once the entry has been
    /// dropped from the cache.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Wait until no fetch is outstanding and return the outcome.
    pub async fn settled(&mut self) -> Result<V, ApiError> {
        match self.receiver.wait_for(|state| state.outcome().is_some()).await {
            Ok(state) => state.outcome().unwrap_or(Err(ApiError::Cancelled)),
            Err(_) => Err(ApiError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::error::TransportError;

    fn key() -> QueryKey {
        QueryKey::products_page(1, None)
    }

    /// Fetcher returning the number of times it has been invoked.
    fn counting(calls: &Arc<AtomicUsize>) -> impl Fn() -> BoxFuture<'static, Result<usize, ApiError>> + Send + Sync {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                tokio::task::yield_now().await;
                Ok(n)
            }
            .boxed()
        }
    }

    /// Fetcher that resolves each call through its own oneshot channel, in
    /// the order the calls were issued.
    fn gated(gates: Vec<oneshot::Receiver<usize>>) -> impl Fn() -> BoxFuture<'static, Result<usize, ApiError>> + Send + Sync {
        let gates = Arc::new(Mutex::new(VecDeque::from(gates)));
        move || {
            let gate = gates.lock().pop_front();
            async move {
                match gate {
                    Some(gate) => gate.await.map_err(|_| ApiError::Cancelled),
                    None => Err(ApiError::Cancelled),
                }
            }
            .boxed()
        }
    }

    async fn let_tasks_run() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_fetch() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let reads = (0..10).map(|_| cache.fetch(key(), counting(&calls)));
        let results = futures::future::join_all(reads).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.into_iter().all(|r| r == Ok(1)));
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_fetching() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        assert_eq!(cache.fetch(key(), counting(&calls)).await, Ok(1));

        let sub = cache.read(key(), counting(&calls));
        let state = sub.current();
        assert_eq!(state.freshness, Freshness::Fresh);
        assert_eq!(state.data, Some(1));
        assert!(!state.is_fetching);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_entry_serves_old_value_while_revalidating() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        cache.fetch(key(), counting(&calls)).await.unwrap();

        assert_eq!(cache.invalidate(&QueryKey::products()), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "no subscribers, so no eager refetch");

        let mut sub = cache.read(key(), counting(&calls));
        let state = sub.current();
        assert_eq!(state.data, Some(1));
        assert_eq!(state.freshness, Freshness::Stale);
        assert!(state.is_fetching);

        assert_eq!(sub.settled().await, Ok(2));
        assert_eq!(sub.current().freshness, Freshness::Fresh);
    }

    #[tokio::test]
    async fn invalidation_refetches_once_for_active_subscriber() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut sub = cache.read(key(), counting(&calls));
        assert_eq!(sub.settled().await, Ok(1));

        cache.invalidate(&key());
        assert!(sub.changed().await);
        assert_eq!(sub.settled().await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let_tasks_run().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropped_subscription_is_not_refetched_eagerly() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut sub = cache.read(key(), counting(&calls));
        sub.settled().await.unwrap();
        drop(sub);
        assert_eq!(cache.subscriber_count(&key()), 0);

        cache.invalidate(&QueryKey::products());
        let_tasks_run().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.peek(&key()).unwrap().freshness, Freshness::Stale);
    }

    #[tokio::test]
    async fn invalidation_only_touches_matching_prefix() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        cache.fetch(QueryKey::products_page(1, None), counting(&calls)).await.unwrap();
        cache.fetch(QueryKey::products_page(2, Some("Home")), counting(&calls)).await.unwrap();
        cache.fetch(QueryKey::product("p1"), counting(&calls)).await.unwrap();

        assert_eq!(cache.invalidate(&QueryKey::products()), 2);
        let product = cache.peek(&QueryKey::product("p1")).unwrap();
        assert_eq!(product.freshness, Freshness::Fresh);
    }

    #[tokio::test]
    async fn failed_fetch_is_retried_on_next_read() {
        let cache: QueryCache<usize> = QueryCache::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let fetcher = {
            let attempts = Arc::clone(&attempts);
            move || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ApiError::from(TransportError::Network("connection refused".to_string())))
                    } else {
                        Ok(n)
                    }
                }
            }
        };

        let err = cache.fetch(key(), fetcher.clone()).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(TransportError::Network(_))));
        assert_eq!(cache.peek(&key()).unwrap().freshness, Freshness::Error);

        assert_eq!(cache.fetch(key(), fetcher).await, Ok(1));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn later_issued_fetch_wins_when_it_resolves_first() {
        let cache = QueryCache::new();
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();

        let mut sub = cache.read(key(), gated(vec![first_rx, second_rx]));
        assert!(cache.refetch(&key()));

        second_tx.send(2).unwrap();
        assert_eq!(sub.settled().await, Ok(2));

        first_tx.send(1).unwrap();
        let_tasks_run().await;
        assert_eq!(cache.peek(&key()).unwrap().data, Some(2));
        assert_eq!(sub.current().data, Some(2));
    }

    #[tokio::test]
    async fn earlier_issued_fetch_is_ignored_when_it_resolves_first() {
        let cache = QueryCache::new();
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();

        let mut sub = cache.read(key(), gated(vec![first_rx, second_rx]));
        cache.invalidate(&key());

        first_tx.send(1).unwrap();
        let_tasks_run().await;
        let state = sub.current();
        assert!(state.is_fetching);
        assert_eq!(state.data, None);

        second_tx.send(2).unwrap();
        assert_eq!(sub.settled().await, Ok(2));
    }

    #[tokio::test]
    async fn invalidation_without_subscribers_orphans_in_flight_fetch() {
        let cache = QueryCache::new();
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        drop(cache.read(key(), gated(vec![first_rx])));

        cache.invalidate(&key());
        first_tx.send(1).unwrap();
        let_tasks_run().await;
        assert_eq!(cache.peek(&key()).unwrap().data, None);

        let mut sub = cache.read(key(), gated(vec![second_rx]));
        second_tx.send(2).unwrap();
        assert_eq!(sub.settled().await, Ok(2));
    }

    #[tokio::test]
    async fn clear_cancels_outstanding_subscriptions() {
        let cache: QueryCache<usize> = QueryCache::new();
        let (_tx, rx) = oneshot::channel();
        let mut sub = cache.read(key(), gated(vec![rx]));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(sub.settled().await, Err(ApiError::Cancelled));
        assert!(!cache.refetch(&key()));
    }

    #[test]
    fn outcome_waits_for_fetch_to_finish() {
        let state: QueryState<u8> = QueryState::loading();
        assert!(state.outcome().is_none());
        let state = QueryState {
            data: Some(3),
            freshness: Freshness::Fresh,
            error: None,
            is_fetching: false,
        };
        assert_eq!(state.outcome(), Some(Ok(3)));
        assert_eq!(state.map(|n| (n > 2).then_some("big")).data, Some("big"));
    }
}
