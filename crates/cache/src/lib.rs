//! Two-tier caching for the matching engine.
//!
//! - [`LruTtlCache`]: bounded in-process tier with LRU eviction and TTL
//! - [`FifoMemo`] / [`MemoPool`]: cheaper insertion-order memo maps for pure
//!   sub-computations (edit distance, bigram sets, phonetic keys)
//! - [`RemoteTier`]: the shared/persistent second tier, swappable behind a
//!   trait so backends can change without touching engine logic
//! - [`TieredCache`]: local-first composition with degrade-on-failure
//!
//! Losing any cache content never changes a result, only its latency.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors from the shared cache tier.
#[derive(Debug, Error)]
pub enum RemoteCacheError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("encode/decode failed: {0}")]
    Codec(String),

    #[error("cache backend not available")]
    Unavailable,
}

/// Stable content-hash key for a (query, product) pair.
///
/// Built from the lower-cased pair under a namespace prefix; deliberately
/// asymmetric, matching the scorer's asymmetric inputs.
pub fn pair_key(namespace: &str, query: &str, product: &str) -> String {
    let content = format!(
        "{namespace}:{}:{}",
        query.to_lowercase(),
        product.to_lowercase()
    );
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Stable content-hash key for a single string under a namespace.
pub fn text_key(namespace: &str, text: &str) -> String {
    let content = format!("{namespace}:{}", text.to_lowercase());
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

struct Slot<V> {
    value: V,
    inserted_at: Instant,
    tick: u64,
}

/// Bounded in-process cache with LRU eviction and per-entry TTL.
///
/// No entry is ever returned past its TTL, even if still resident. Recency
/// is tracked with a monotonic tick index so eviction is O(log n).
pub struct LruTtlCache<K, V> {
    capacity: usize,
    ttl: Duration,
    next_tick: u64,
    entries: HashMap<K, Slot<V>>,
    recency: BTreeMap<u64, K>,
}

impl<K, V> LruTtlCache<K, V>
where
    K: Clone + Eq + std::hash::Hash,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            next_tick: 0,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a key, refreshing its recency. Expired entries are dropped.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(slot) => slot.inserted_at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            if let Some(slot) = self.entries.remove(key) {
                self.recency.remove(&slot.tick);
            }
            return None;
        }

        let tick = self.bump_tick();
        let slot = self.entries.get_mut(key).expect("checked above");
        self.recency.remove(&slot.tick);
        slot.tick = tick;
        self.recency.insert(tick, key.clone());
        Some(slot.value.clone())
    }

    /// Insert a value, evicting the least recently used entry at capacity.
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(old) = self.entries.remove(&key) {
            self.recency.remove(&old.tick);
        } else if self.entries.len() >= self.capacity {
            if let Some((_, victim)) = self.recency.pop_first() {
                self.entries.remove(&victim);
            }
        }

        let tick = self.bump_tick();
        self.recency.insert(tick, key.clone());
        self.entries.insert(
            key,
            Slot {
                value,
                inserted_at: Instant::now(),
                tick,
            },
        );
    }

    /// Drop every expired entry.
    pub fn prune_expired(&mut self) {
        let ttl = self.ttl;
        let dead: Vec<(K, u64)> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.inserted_at.elapsed() >= ttl)
            .map(|(k, slot)| (k.clone(), slot.tick))
            .collect();
        for (key, tick) in dead {
            self.entries.remove(&key);
            self.recency.remove(&tick);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn bump_tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }
}

/// Bounded memo map with FIFO eviction (oldest inserted key dropped first).
///
/// Cheaper than LRU; acceptable for pure functions of their keys where a
/// miss only costs recomputation.
pub struct FifoMemo<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K, V> FifoMemo<K, V>
where
    K: Clone + Eq + std::hash::Hash,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, compute: F) -> V {
        if let Some(value) = self.entries.get(&key) {
            return value.clone();
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        let value = compute();
        self.entries.insert(key.clone(), value.clone());
        self.order.push_back(key);
        value
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Default capacity for each memo map.
pub const MEMO_CAPACITY: usize = 8_192;

/// The memoized sub-computation maps shared by scoring calls.
pub struct MemoPool {
    distances: Mutex<FifoMemo<(String, String), usize>>,
    bigrams: Mutex<FifoMemo<String, BTreeSet<String>>>,
    phonetics: Mutex<FifoMemo<String, String>>,
}

impl MemoPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            distances: Mutex::new(FifoMemo::new(capacity)),
            bigrams: Mutex::new(FifoMemo::new(capacity)),
            phonetics: Mutex::new(FifoMemo::new(capacity)),
        }
    }

    pub fn distance<F: FnOnce() -> usize>(&self, a: &str, b: &str, compute: F) -> usize {
        self.distances
            .lock()
            .get_or_insert_with((a.to_string(), b.to_string()), compute)
    }

    pub fn bigrams<F: FnOnce() -> BTreeSet<String>>(&self, text: &str, compute: F) -> BTreeSet<String> {
        self.bigrams
            .lock()
            .get_or_insert_with(text.to_string(), compute)
    }

    pub fn phonetic<F: FnOnce() -> String>(&self, text: &str, compute: F) -> String {
        self.phonetics
            .lock()
            .get_or_insert_with(text.to_string(), compute)
    }

    pub fn clear(&self) {
        self.distances.lock().clear();
        self.bigrams.lock().clear();
        self.phonetics.lock().clear();
    }
}

impl Default for MemoPool {
    fn default() -> Self {
        Self::new(MEMO_CAPACITY)
    }
}

/// The shared/persistent second cache tier.
///
/// Implementations must bound their own round-trip time; the tiered cache
/// treats any error as a miss and computes directly.
pub trait RemoteTier: Send + Sync {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, RemoteCacheError>> + Send;

    fn put(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), RemoteCacheError>> + Send;

    /// Drop every entry held by this tier.
    fn flush(&self) -> impl Future<Output = Result<(), RemoteCacheError>> + Send;

    fn health_check(&self) -> impl Future<Output = Result<(), RemoteCacheError>> + Send;

    /// Tier name for logging.
    fn name(&self) -> &'static str;
}

/// In-process [`RemoteTier`] for tests and single-node deployments.
#[derive(Default)]
pub struct MemoryRemote {
    entries: Mutex<HashMap<String, (String, Instant, Duration)>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl RemoteTier for MemoryRemote {
    async fn get(&self, key: &str) -> Result<Option<String>, RemoteCacheError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, inserted_at, ttl)) if inserted_at.elapsed() < *ttl => {
                Ok(Some(value.clone()))
            }
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RemoteCacheError> {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), Instant::now(), ttl));
        Ok(())
    }

    async fn flush(&self) -> Result<(), RemoteCacheError> {
        self.entries.lock().clear();
        Ok(())
    }

    async fn health_check(&self) -> Result<(), RemoteCacheError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Where a cached value was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Local,
    Remote,
    Computed,
}

impl Lookup {
    pub fn is_hit(&self) -> bool {
        !matches!(self, Self::Computed)
    }
}

/// Hit/miss counters for one tiered cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TierStats {
    pub local_hits: u64,
    pub remote_hits: u64,
    pub misses: u64,
}

impl TierStats {
    pub fn total(&self) -> u64 {
        self.local_hits + self.remote_hits + self.misses
    }

    pub fn hit_rate(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.local_hits + self.remote_hits) as f32 / total as f32
    }
}

/// Local-first two-tier cache: bounded LRU checked first, then the shared
/// tier, then direct computation populating both.
pub struct TieredCache<V, R> {
    label: &'static str,
    local: Mutex<LruTtlCache<String, V>>,
    remote: Option<Arc<R>>,
    remote_ttl: Duration,
    local_hits: AtomicU64,
    remote_hits: AtomicU64,
    misses: AtomicU64,
}

impl<V, R> TieredCache<V, R>
where
    V: Clone + Serialize + DeserializeOwned,
    R: RemoteTier,
{
    pub fn new(
        label: &'static str,
        capacity: usize,
        local_ttl: Duration,
        remote_ttl: Duration,
        remote: Option<Arc<R>>,
    ) -> Self {
        Self {
            label,
            local: Mutex::new(LruTtlCache::new(capacity, local_ttl)),
            remote,
            remote_ttl,
            local_hits: AtomicU64::new(0),
            remote_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fetch a value, consulting the local tier, then the remote tier, then
    /// `compute`. Remote failures degrade to computation; they are logged
    /// and never surfaced to the caller.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> (V, Lookup)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let local_hit = self.local.lock().get(&key.to_string());
        if let Some(value) = local_hit {
            self.local_hits.fetch_add(1, Ordering::Relaxed);
            return (value, Lookup::Local);
        }

        if let Some(remote) = &self.remote {
            match remote.get(key).await {
                Ok(Some(raw)) => match serde_json::from_str::<V>(&raw) {
                    Ok(value) => {
                        self.remote_hits.fetch_add(1, Ordering::Relaxed);
                        self.local.lock().insert(key.to_string(), value.clone());
                        return (value, Lookup::Remote);
                    }
                    Err(e) => {
                        tracing::warn!(cache = self.label, error = %e, "discarding undecodable remote entry");
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        cache = self.label,
                        tier = remote.name(),
                        error = %e,
                        "remote tier unavailable, computing directly"
                    );
                }
            }
        }

        let value = compute().await;
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.local.lock().insert(key.to_string(), value.clone());

        if let Some(remote) = &self.remote {
            match serde_json::to_string(&value) {
                Ok(raw) => {
                    if let Err(e) = remote.put(key, &raw, self.remote_ttl).await {
                        tracing::warn!(
                            cache = self.label,
                            tier = remote.name(),
                            error = %e,
                            "failed to populate remote tier"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(cache = self.label, error = %e, "failed to encode value for remote tier");
                }
            }
        }

        (value, Lookup::Computed)
    }

    /// Empty the local tier and flush the remote tier.
    pub async fn clear(&self) {
        self.local.lock().clear();
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.flush().await {
                tracing::warn!(cache = self.label, tier = remote.name(), error = %e, "remote flush failed");
            }
        }
    }

    /// Drop expired local entries. Run from the maintenance task.
    pub fn prune_expired(&self) {
        self.local.lock().prune_expired();
    }

    pub fn local_len(&self) -> usize {
        self.local.lock().len()
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_pair_key_asymmetric() {
        assert_ne!(pair_key("score", "milk", "bread"), pair_key("score", "bread", "milk"));
        assert_eq!(pair_key("score", "Milk", "Bread"), pair_key("score", "milk", "bread"));
        assert_ne!(pair_key("score", "milk", "bread"), pair_key("feat", "milk", "bread"));
    }

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let mut cache = LruTtlCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        // touch "a" so "b" is the eviction victim
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);

        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_lru_ttl_expiry() {
        let mut cache = LruTtlCache::new(8, Duration::from_millis(20));
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_prune_expired() {
        let mut cache = LruTtlCache::new(8, Duration::from_millis(20));
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(30));
        cache.prune_expired();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fifo_evicts_oldest_insert() {
        let mut memo = FifoMemo::new(2);
        memo.get_or_insert_with("a", || 1);
        memo.get_or_insert_with("b", || 2);
        // access does not refresh FIFO position
        memo.get_or_insert_with("a", || 99);
        memo.get_or_insert_with("c", || 3);

        assert_eq!(memo.len(), 2);
        // "a" was oldest and is gone; recompute yields the new value
        assert_eq!(memo.get_or_insert_with("a", || 42), 42);
    }

    #[test]
    fn test_memo_pool_computes_once() {
        let pool = MemoPool::new(16);
        let calls = AtomicUsize::new(0);

        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            3
        };
        assert_eq!(pool.distance("milk", "silk", compute), 3);
        assert_eq!(pool.distance("milk", "silk", || unreachable!()), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tiered_compute_once_per_ttl_window() {
        let cache: TieredCache<f32, MemoryRemote> = TieredCache::new(
            "score",
            16,
            Duration::from_secs(60),
            Duration::from_secs(60),
            Some(Arc::new(MemoryRemote::new())),
        );
        let calls = AtomicUsize::new(0);

        let (v1, l1) = cache
            .get_or_compute("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                0.75
            })
            .await;
        let (v2, l2) = cache.get_or_compute("k", || async { unreachable!() }).await;

        assert_eq!(v1, 0.75);
        assert_eq!(v2, 0.75);
        assert_eq!(l1, Lookup::Computed);
        assert_eq!(l2, Lookup::Local);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tiered_falls_back_to_remote_tier() {
        let remote = Arc::new(MemoryRemote::new());
        let cache: TieredCache<f32, MemoryRemote> = TieredCache::new(
            "score",
            16,
            Duration::from_secs(60),
            Duration::from_secs(60),
            Some(remote.clone()),
        );

        cache.get_or_compute("k", || async { 0.5 }).await;
        // wipe the local tier only; the remote copy must serve the hit
        cache.local.lock().clear();

        let (value, lookup) = cache.get_or_compute("k", || async { unreachable!() }).await;
        assert_eq!(value, 0.5);
        assert_eq!(lookup, Lookup::Remote);
    }

    struct FailingRemote;

    impl RemoteTier for FailingRemote {
        async fn get(&self, _key: &str) -> Result<Option<String>, RemoteCacheError> {
            Err(RemoteCacheError::Unavailable)
        }

        async fn put(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> Result<(), RemoteCacheError> {
            Err(RemoteCacheError::Unavailable)
        }

        async fn flush(&self) -> Result<(), RemoteCacheError> {
            Err(RemoteCacheError::Unavailable)
        }

        async fn health_check(&self) -> Result<(), RemoteCacheError> {
            Err(RemoteCacheError::Unavailable)
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_tiered_degrades_when_remote_is_down() {
        let cache: TieredCache<f32, FailingRemote> = TieredCache::new(
            "score",
            16,
            Duration::from_secs(60),
            Duration::from_secs(60),
            Some(Arc::new(FailingRemote)),
        );

        let (value, lookup) = cache.get_or_compute("k", || async { 0.9 }).await;
        assert_eq!(value, 0.9);
        assert_eq!(lookup, Lookup::Computed);

        // still served locally afterwards
        let (value, lookup) = cache.get_or_compute("k", || async { unreachable!() }).await;
        assert_eq!(value, 0.9);
        assert_eq!(lookup, Lookup::Local);
    }

    #[tokio::test]
    async fn test_clear_empties_both_tiers() {
        let remote = Arc::new(MemoryRemote::new());
        let cache: TieredCache<f32, MemoryRemote> = TieredCache::new(
            "score",
            16,
            Duration::from_secs(60),
            Duration::from_secs(60),
            Some(remote.clone()),
        );

        cache.get_or_compute("k", || async { 0.5 }).await;
        assert_eq!(cache.local_len(), 1);
        assert_eq!(remote.len(), 1);

        cache.clear().await;
        assert_eq!(cache.local_len(), 0);
        assert!(remote.is_empty());
    }

    #[test]
    fn test_tier_stats_hit_rate() {
        let stats = TierStats {
            local_hits: 6,
            remote_hits: 2,
            misses: 2,
        };
        assert!((stats.hit_rate() - 0.8).abs() < 1e-6);
        assert_eq!(TierStats::default().hit_rate(), 0.0);
    }
}
