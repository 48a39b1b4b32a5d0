// Cached stats store.
// Serves the stats payload from cache while fresh; refreshes over the
// network otherwise. Overlapping refreshes are serialized behind a gate.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Result;

use super::snapshot::{Snapshot, SnapshotStore};

/// The stats payload, treated as an opaque JSON object.
pub type StatsMap = Map<String, Value>;

/// Default TTL for cached stats: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Source of the stats payload. The HTTP client implements this; tests
/// substitute their own.
pub trait StatsSource {
    /// Fetch the full stats payload.
    fn fetch_stats(&self) -> impl Future<Output = Result<StatsMap>> + Send;
}

/// Cached fields mutated by fetch and clear.
#[derive(Debug, Default)]
struct CacheState {
    stats: StatsMap,
    last_fetched: Option<DateTime<Utc>>,
}

/// TTL-cached store for the stats payload.
///
/// Holds the last successfully fetched payload and serves it without a
/// network call while it is fresh. A failed refresh leaves the cached
/// payload and timestamp untouched. Overlapping refreshes are
/// serialized: callers waiting on the gate re-check freshness once they
/// acquire it, so a burst of unforced callers costs one network call.
pub struct StatsStore<S> {
    source: S,
    ttl: Duration,
    snapshot: Option<Box<dyn SnapshotStore + Send + Sync>>,
    state: Mutex<CacheState>,
    loading: AtomicBool,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl<S: StatsSource> StatsStore<S> {
    /// Create a store with the default 5 minute TTL.
    pub fn new(source: S) -> Self {
        Self::with_ttl(source, DEFAULT_TTL)
    }

    /// Create a store with an explicit TTL.
    pub fn with_ttl(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            snapshot: None,
            state: Mutex::new(CacheState::default()),
            loading: AtomicBool::new(false),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Attach a persistence collaborator and rehydrate from it.
    ///
    /// Only the payload and timestamp are restored; freshness is not
    /// revalidated, so a stale snapshot simply fails the next freshness
    /// check. Load failures are logged and ignored.
    pub fn with_snapshot_store(
        mut self,
        store: impl SnapshotStore + Send + Sync + 'static,
    ) -> Self {
        match store.load() {
            Ok(Some(snapshot)) => {
                debug!(entries = snapshot.stats.len(), "rehydrated stats snapshot");
                let mut state = self.lock_state();
                state.stats = snapshot.stats;
                state.last_fetched = snapshot.last_fetched;
            }
            Ok(None) => {}
            Err(err) => warn!("failed to load stats snapshot: {}", err),
        }

        self.snapshot = Some(Box::new(store));
        self
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether the cache holds a non-empty payload.
    pub fn has_data(&self) -> bool {
        !self.lock_state().stats.is_empty()
    }

    /// Whether the cached payload is within its TTL.
    pub fn is_data_fresh(&self) -> bool {
        let state = self.lock_state();
        match state.last_fetched {
            Some(last) => elapsed_since(last) < self.ttl,
            None => false,
        }
    }

    /// Whether a fetch is currently in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Timestamp of the last successful fetch.
    pub fn last_fetched(&self) -> Option<DateTime<Utc>> {
        self.lock_state().last_fetched
    }

    /// A copy of the cached payload, whatever its freshness.
    pub fn cached_stats(&self) -> StatsMap {
        self.lock_state().stats.clone()
    }

    /// Get the stats payload, fetching from the source unless the cache
    /// is present and fresh.
    ///
    /// `force_refresh` bypasses the freshness check and always fetches.
    /// On failure the cached payload and timestamp are left untouched
    /// and the error propagates to the caller.
    pub async fn get_stats(&self, force_refresh: bool) -> Result<StatsMap> {
        if !force_refresh {
            if let Some(stats) = self.fresh_stats() {
                return Ok(stats);
            }
        }

        let _gate = self.refresh_gate.lock().await;

        // A caller holding the gate may have refreshed while we waited.
        if !force_refresh {
            if let Some(stats) = self.fresh_stats() {
                return Ok(stats);
            }
        }

        self.loading.store(true, Ordering::SeqCst);
        let fetched = self.source.fetch_stats().await;
        self.loading.store(false, Ordering::SeqCst);

        let stats = match fetched {
            Ok(stats) => stats,
            Err(err) => {
                warn!("stats fetch failed: {}", err);
                return Err(err);
            }
        };

        {
            let mut state = self.lock_state();
            state.stats = stats.clone();
            state.last_fetched = Some(Utc::now());
        }
        debug!(entries = stats.len(), "stats fetched and cached");

        self.persist();
        Ok(stats)
    }

    /// Reset the cache to empty and remove the persisted snapshot.
    /// Idempotent; no network effect.
    pub fn clear_cache(&self) {
        {
            let mut state = self.lock_state();
            state.stats = StatsMap::new();
            state.last_fetched = None;
        }

        if let Some(store) = &self.snapshot {
            if let Err(err) = store.clear() {
                warn!("failed to clear stats snapshot: {}", err);
            }
        }
    }

    /// The cached payload if it is present and fresh.
    fn fresh_stats(&self) -> Option<StatsMap> {
        let state = self.lock_state();
        if state.stats.is_empty() {
            return None;
        }
        let last = state.last_fetched?;
        if elapsed_since(last) < self.ttl {
            Some(state.stats.clone())
        } else {
            None
        }
    }

    /// Snapshot the current payload and timestamp. Best-effort: save
    /// failures are logged, never surfaced.
    fn persist(&self) {
        let Some(store) = &self.snapshot else {
            return;
        };

        let snapshot = {
            let state = self.lock_state();
            Snapshot {
                stats: state.stats.clone(),
                last_fetched: state.last_fetched,
            }
        };

        if let Err(err) = store.save(&snapshot) {
            warn!("failed to persist stats snapshot: {}", err);
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().expect("cache state lock poisoned")
    }
}

fn elapsed_since(last: DateTime<Utc>) -> Duration {
    Utc::now()
        .signed_duration_since(last)
        .to_std()
        .unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnidexError;
    use crate::store::snapshot::FileSnapshotStore;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn stats(value: &Value) -> StatsMap {
        value.as_object().unwrap().clone()
    }

    /// Source returning a queue of canned responses, counting calls.
    struct MockSource {
        responses: Mutex<VecDeque<Result<StatsMap>>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl MockSource {
        fn new(responses: Vec<Result<StatsMap>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn ok(payload: &Value) -> Self {
            Self::new(vec![Ok(stats(payload))])
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StatsSource for &MockSource {
        async fn fetch_stats(&self) -> Result<StatsMap> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AnidexError::Other("no response queued".to_string())))
        }
    }

    fn backdate(store: &StatsStore<&MockSource>, secs: i64) {
        let mut state = store.state.lock().unwrap();
        state.last_fetched = Some(Utc::now() - chrono::Duration::seconds(secs));
    }

    #[test]
    fn test_empty_store_has_no_data() {
        let source = MockSource::new(vec![]);
        let store = StatsStore::new(&source);

        assert!(!store.has_data());
        assert!(!store.is_data_fresh());
        assert!(!store.is_loading());
        assert!(store.last_fetched().is_none());
    }

    #[tokio::test]
    async fn test_successful_fetch_populates_cache() {
        let source = MockSource::ok(&json!({ "total_anime": 42 }));
        let store = StatsStore::new(&source);

        let result = store.get_stats(false).await.unwrap();
        assert_eq!(result.get("total_anime"), Some(&json!(42)));

        assert!(store.has_data());
        assert!(store.is_data_fresh());
        assert!(!store.is_loading());
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_network() {
        let source = MockSource::ok(&json!({ "a": 1 }));
        let store = StatsStore::new(&source);

        let first = store.get_stats(false).await.unwrap();
        let second = store.get_stats(false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_cache_refetches() {
        let source = MockSource::new(vec![
            Ok(stats(&json!({ "a": 1 }))),
            Ok(stats(&json!({ "a": 2 }))),
        ]);
        let store = StatsStore::new(&source);

        store.get_stats(false).await.unwrap();
        backdate(&store, 310);
        assert!(!store.is_data_fresh());

        let refreshed = store.get_stats(false).await.unwrap();
        assert_eq!(refreshed.get("a"), Some(&json!(2)));
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_ttl_window() {
        let source = MockSource::new(vec![
            Ok(stats(&json!({ "a": 1 }))),
            Ok(stats(&json!({ "a": 2 }))),
        ]);
        let store = StatsStore::with_ttl(&source, Duration::from_secs(300));

        // Fetch at t=0
        let first = store.get_stats(false).await.unwrap();
        assert_eq!(first.get("a"), Some(&json!(1)));

        // t=100s: well within the TTL, served from cache
        backdate(&store, 100);
        let cached = store.get_stats(false).await.unwrap();
        assert_eq!(cached.get("a"), Some(&json!(1)));
        assert_eq!(source.call_count(), 1);

        // t=310s: past the TTL, a new request goes out
        backdate(&store, 310);
        let refreshed = store.get_stats(false).await.unwrap();
        assert_eq!(refreshed.get("a"), Some(&json!(2)));
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_always_fetches() {
        let source = MockSource::new(vec![
            Ok(stats(&json!({ "a": 1 }))),
            Ok(stats(&json!({ "a": 2 }))),
        ]);
        let store = StatsStore::new(&source);

        store.get_stats(false).await.unwrap();
        assert!(store.is_data_fresh());

        let refreshed = store.get_stats(true).await.unwrap();
        assert_eq!(refreshed.get("a"), Some(&json!(2)));
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_cache() {
        let source = MockSource::new(vec![
            Ok(stats(&json!({ "a": 1 }))),
            Err(AnidexError::Other("connection refused".to_string())),
        ]);
        let store = StatsStore::new(&source);

        store.get_stats(false).await.unwrap();
        let before = store.last_fetched();

        let result = store.get_stats(true).await;
        assert!(result.is_err());

        assert!(store.has_data());
        assert_eq!(store.cached_stats().get("a"), Some(&json!(1)));
        assert_eq!(store.last_fetched(), before);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_failed_fetch_on_empty_store() {
        let source = MockSource::new(vec![Err(AnidexError::Other("boom".to_string()))]);
        let store = StatsStore::new(&source);

        assert!(store.get_stats(false).await.is_err());
        assert!(!store.has_data());
        assert!(store.last_fetched().is_none());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let source = MockSource::ok(&json!({ "a": 1 }));
        let store = StatsStore::new(&source);

        store.get_stats(false).await.unwrap();
        assert!(store.has_data());

        store.clear_cache();
        assert!(!store.has_data());
        assert!(!store.is_data_fresh());
        assert!(store.last_fetched().is_none());

        // Idempotent
        store.clear_cache();
        assert!(!store.has_data());
    }

    #[tokio::test]
    async fn test_concurrent_unforced_calls_share_one_fetch() {
        let source =
            MockSource::ok(&json!({ "a": 1 })).with_delay(Duration::from_millis(20));
        let store = StatsStore::new(&source);

        let (first, second) = tokio::join!(store.get_stats(false), store.get_stats(false));

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_forced_calls_are_serialized() {
        let source = MockSource::new(vec![
            Ok(stats(&json!({ "seq": 1 }))),
            Ok(stats(&json!({ "seq": 2 }))),
        ])
        .with_delay(Duration::from_millis(10));
        let store = StatsStore::new(&source);

        let (first, second) = tokio::join!(store.get_stats(true), store.get_stats(true));

        assert_eq!(first.unwrap().get("seq"), Some(&json!(1)));
        assert_eq!(second.unwrap().get("seq"), Some(&json!(2)));
        assert_eq!(source.call_count(), 2);

        // The later fetch is the one left in the cache
        assert_eq!(store.cached_stats().get("seq"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_fetch_persists_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("anime-stats.json");

        let source = MockSource::ok(&json!({ "a": 1 }));
        let store =
            StatsStore::new(&source).with_snapshot_store(FileSnapshotStore::new(&path));

        store.get_stats(false).await.unwrap();
        assert!(path.exists());

        store.clear_cache();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_rehydration_restores_cache() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("anime-stats.json");

        {
            let source = MockSource::ok(&json!({ "a": 1 }));
            let store =
                StatsStore::new(&source).with_snapshot_store(FileSnapshotStore::new(&path));
            store.get_stats(false).await.unwrap();
        }

        // A fresh store rehydrates and serves the snapshot without a fetch
        let source = MockSource::new(vec![]);
        let store =
            StatsStore::new(&source).with_snapshot_store(FileSnapshotStore::new(&path));

        assert!(store.has_data());
        assert!(store.is_data_fresh());

        let served = store.get_stats(false).await.unwrap();
        assert_eq!(served.get("a"), Some(&json!(1)));
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_rehydrated_snapshot_refetches() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("anime-stats.json");

        let stale = Snapshot {
            stats: stats(&json!({ "a": 1 })),
            last_fetched: Some(Utc::now() - chrono::Duration::seconds(600)),
        };
        FileSnapshotStore::new(&path).save(&stale).unwrap();

        let source = MockSource::ok(&json!({ "a": 2 }));
        let store =
            StatsStore::new(&source).with_snapshot_store(FileSnapshotStore::new(&path));

        assert!(store.has_data());
        assert!(!store.is_data_fresh());

        let refreshed = store.get_stats(false).await.unwrap();
        assert_eq!(refreshed.get("a"), Some(&json!(2)));
        assert_eq!(source.call_count(), 1);
    }
}
