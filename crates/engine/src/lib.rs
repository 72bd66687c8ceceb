//! The product matching engine.
//!
//! Wires feature extraction, scoring, the two cache tiers, and the adaptive
//! weight model into one explicitly constructed [`MatchingEngine`] that is
//! passed to callers rather than reached through globals, so tests can run
//! isolated instances side by side.
//!
//! Shared mutable state is confined to the cache tiers, the published weight
//! vector, and the feedback buffer. Weights are published as a complete
//! `Arc<WeightModel>` swapped in after training; scoring calls read a
//! consistent snapshot and never a half-updated vector.

use grocermatch_cache::{
    pair_key, text_key, Lookup, MemoPool, MemoryRemote, RemoteTier, TierStats, TieredCache,
};
use grocermatch_features as features;
use grocermatch_model::{
    BatchReport, FeedbackEvent, PairScore, ProductFeatures, SimilarityMetrics, WeightModel,
};
use grocermatch_scoring::Scorer;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Damping factor keeping any single feedback event from swinging the
/// weights sharply.
const DAMPING: f32 = 0.1;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Local score-cache capacity
    pub score_capacity: usize,
    /// Local score-cache TTL
    pub score_ttl: Duration,
    /// Local feature-cache capacity
    pub feature_capacity: usize,
    /// Local feature-cache TTL
    pub feature_ttl: Duration,
    /// Shared-tier TTL for scores
    pub remote_score_ttl: Duration,
    /// Shared-tier TTL for extracted features
    pub remote_feature_ttl: Duration,
    /// Capacity of each sub-computation memo map
    pub memo_capacity: usize,
    /// Buffer size that triggers synchronous training
    pub train_threshold: usize,
    /// Minimum buffered events for training to run at all
    pub min_train_events: usize,
    /// Events retained after a training pass
    pub feedback_window: usize,
    /// Queries scored concurrently per batch chunk
    pub batch_chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            score_capacity: 10_000,
            score_ttl: Duration::from_secs(3600),
            feature_capacity: 10_000,
            feature_ttl: Duration::from_secs(3600),
            remote_score_ttl: Duration::from_secs(3600),
            remote_feature_ttl: Duration::from_secs(24 * 3600),
            memo_capacity: 8_192,
            train_threshold: 100,
            min_train_events: 50,
            feedback_window: 100,
            batch_chunk_size: 100,
        }
    }
}

/// Cache counters for the operational dashboard.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub scores: TierStats,
    pub features: TierStats,
}

struct Inner<R> {
    config: EngineConfig,
    memo: Arc<MemoPool>,
    scorer: Scorer,
    score_cache: TieredCache<f32, R>,
    feature_cache: TieredCache<ProductFeatures, R>,
    weights: RwLock<Arc<WeightModel>>,
    feedback: Mutex<Vec<FeedbackEvent>>,
}

/// The matching engine. Cheap to clone; clones share all state.
pub struct MatchingEngine<R: RemoteTier> {
    inner: Arc<Inner<R>>,
}

impl<R: RemoteTier> Clone for MatchingEngine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl MatchingEngine<MemoryRemote> {
    /// Engine with no shared tier; the local tiers do all the caching.
    pub fn new(config: EngineConfig) -> Self {
        Self::build(config, None)
    }
}

impl<R: RemoteTier + 'static> MatchingEngine<R> {
    /// Engine backed by a shared cache tier.
    pub fn with_remote(config: EngineConfig, remote: R) -> Self {
        Self::build(config, Some(Arc::new(remote)))
    }

    fn build(config: EngineConfig, remote: Option<Arc<R>>) -> Self {
        let memo = Arc::new(MemoPool::new(config.memo_capacity));
        let score_cache = TieredCache::new(
            "scores",
            config.score_capacity,
            config.score_ttl,
            config.remote_score_ttl,
            remote.clone(),
        );
        let feature_cache = TieredCache::new(
            "features",
            config.feature_capacity,
            config.feature_ttl,
            config.remote_feature_ttl,
            remote,
        );

        Self {
            inner: Arc::new(Inner {
                config,
                scorer: Scorer::new(memo.clone()),
                memo,
                score_cache,
                feature_cache,
                weights: RwLock::new(Arc::new(WeightModel::default())),
                feedback: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Snapshot of the currently published weights. Hosts that persist
    /// weights across restarts serialize this snapshot.
    pub fn current_weights(&self) -> Arc<WeightModel> {
        self.inner.weights.read().clone()
    }

    /// Publish a previously snapshotted weight model, e.g. on startup.
    /// Normalized before publication so the sum-to-one invariant holds no
    /// matter what the host stored.
    pub fn restore_weights(&self, mut weights: WeightModel) {
        weights.normalize();
        *self.inner.weights.write() = Arc::new(weights);
    }

    /// Extract features for a string through the feature cache, with the
    /// phonetic fingerprint routed through the memo pool.
    pub async fn features(&self, text: &str) -> ProductFeatures {
        let key = text_key("features", text);
        self.inner
            .feature_cache
            .get_or_compute(&key, || async {
                features::extract_with(text, |normalized| {
                    self.inner
                        .memo
                        .phonetic(normalized, || features::phonetic_key(normalized))
                })
            })
            .await
            .0
    }

    /// Overall match score for one (query, product) pair, cached.
    pub async fn score_pair(&self, query: &str, product: &str) -> f32 {
        self.score_pair_tracked(query, product).await.0
    }

    async fn score_pair_tracked(&self, query: &str, product: &str) -> (f32, Lookup) {
        let key = pair_key("scores", query, product);
        self.inner
            .score_cache
            .get_or_compute(&key, || async {
                let a = self.features(query).await;
                let b = self.features(product).await;
                let weights = self.current_weights();
                self.inner.scorer.score(&a, &b, &weights).overall
            })
            .await
    }

    /// Full per-signal metrics for one pair, bypassing the score cache.
    /// Used by explanation surfaces that need more than the overall score.
    pub async fn score_metrics(&self, query: &str, product: &str) -> SimilarityMetrics {
        let a = self.features(query).await;
        let b = self.features(product).await;
        let weights = self.current_weights();
        self.inner.scorer.score(&a, &b, &weights)
    }

    /// Score every query against every product.
    ///
    /// Product features are pre-warmed before scoring begins so the nested
    /// loop never repeats extraction. Pairs execute concurrently in bounded
    /// chunks of queries with no ordering between them.
    pub async fn match_batch(&self, queries: &[String], products: &[String]) -> BatchReport {
        let started = Instant::now();

        for product in products {
            self.features(product).await;
        }

        let shared_products: Arc<Vec<String>> = Arc::new(products.to_vec());
        let mut scores = Vec::with_capacity(queries.len() * products.len());
        let mut cache_hits = 0usize;

        for chunk in queries.chunks(self.inner.config.batch_chunk_size.max(1)) {
            let mut tasks = JoinSet::new();
            for query in chunk {
                let engine = self.clone();
                let query = query.clone();
                let products = shared_products.clone();
                tasks.spawn(async move {
                    let mut rows = Vec::with_capacity(products.len());
                    let mut hits = 0usize;
                    for product in products.iter() {
                        let (score, lookup) = engine.score_pair_tracked(&query, product).await;
                        if lookup.is_hit() {
                            hits += 1;
                        }
                        rows.push(PairScore {
                            query: query.clone(),
                            product: product.clone(),
                            score,
                        });
                    }
                    (rows, hits)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((rows, hits)) => {
                        scores.extend(rows);
                        cache_hits += hits;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "batch scoring task failed");
                    }
                }
            }
        }

        let total_pairs = queries.len() * products.len();
        BatchReport {
            scores,
            total_pairs,
            cache_hits,
            cache_hit_rate: if total_pairs == 0 {
                0.0
            } else {
                cache_hits as f32 / total_pairs as f32
            },
            elapsed: started.elapsed(),
        }
    }

    /// Append a feedback event; crossing the buffer threshold triggers a
    /// synchronous training pass.
    pub fn record_feedback(&self, event: FeedbackEvent) {
        let should_train = {
            let mut buffer = self.inner.feedback.lock();
            buffer.push(event);
            buffer.len() >= self.inner.config.train_threshold
        };
        if should_train {
            self.train();
        }
    }

    pub fn feedback_len(&self) -> usize {
        self.inner.feedback.lock().len()
    }

    /// One damped gradient step per buffered event, then renormalize and
    /// publish the new weight vector in a single swap. A no-op when the
    /// buffer is below the training minimum. The buffer is trimmed to the
    /// most recent window afterwards, keeping a sliding window of signal.
    pub fn train(&self) {
        let mut buffer = self.inner.feedback.lock();
        if buffer.len() < self.inner.config.min_train_events {
            tracing::debug!(
                events = buffer.len(),
                minimum = self.inner.config.min_train_events,
                "skipping training, buffer below minimum"
            );
            return;
        }

        let mut next = **self.inner.weights.read();
        for event in buffer.iter() {
            let error = event.label.expected() - event.score;
            let delta = next.learning_rate * error * DAMPING;
            next.lexical += delta;
            next.semantic += delta;
            next.brand += delta;
            next.category += delta;
            next.size += delta;
        }
        next.normalize();

        *self.inner.weights.write() = Arc::new(next);

        let trained = buffer.len();
        let window = self.inner.config.feedback_window;
        if buffer.len() > window {
            let excess = buffer.len() - window;
            buffer.drain(..excess);
        }
        tracing::debug!(events = trained, retained = buffer.len(), "published retrained weights");
    }

    /// Periodic maintenance: train on whatever feedback has accumulated and
    /// drop expired local cache entries. Abort the handle to stop.
    pub fn spawn_maintenance(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                engine.train();
                engine.inner.score_cache.prune_expired();
                engine.inner.feature_cache.prune_expired();
                tracing::debug!("maintenance pass complete");
            }
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            scores: self.inner.score_cache.stats(),
            features: self.inner.feature_cache.stats(),
        }
    }

    /// Empty every cache tier and every memo map.
    pub async fn clear_all(&self) {
        self.inner.score_cache.clear().await;
        self.inner.feature_cache.clear().await;
        self.inner.memo.clear();
    }
}
