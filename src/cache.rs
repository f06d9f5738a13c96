//! Bounded, TTL-evicting lookup cache with coalesced loads.
//!
//! [`LookupCache`] is a get-or-compute cache in front of a boundary-backed
//! loader. Expired entries are treated as absent and reaped lazily on access;
//! capacity pressure evicts the least-recently-used entry, ties broken by the
//! earliest insertion. Concurrent misses on the same key are coalesced through
//! a per-key guard so a burst of callers performs exactly one upstream load;
//! waiters re-check the map after acquiring the guard and count as hits, while
//! only actual loader invocations count as misses.

// std
use std::{
	hash::Hash,
	sync::atomic::{AtomicU64, Ordering},
};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Boxed future returned by [`ValueLoader::load`].
pub type LoadFuture<'a, V> = Pin<Box<dyn Future<Output = Result<V>> + 'a + Send>>;

/// Contract for loaders that compute a missing value, typically through a
/// [`ClientBoundary`](crate::boundary::ClientBoundary).
pub trait ValueLoader<K, V>
where
	Self: Send + Sync,
{
	/// Fetches the value for `key` from upstream.
	fn load<'a>(&'a self, key: &'a K) -> LoadFuture<'a, V>;
}

/// Validated capacity + time-to-live pair.
#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
	/// Maximum number of live entries after any completed operation.
	pub capacity: NonZeroUsize,
	/// Age beyond which an entry is treated as absent.
	pub time_to_live: Duration,
}
impl CacheConfig {
	/// Creates a configuration, rejecting negative time-to-live values.
	pub fn new(capacity: NonZeroUsize, time_to_live: Duration) -> Result<Self, ConfigError> {
		if time_to_live.is_negative() {
			return Err(ConfigError::NegativeTimeToLive);
		}

		Ok(Self { capacity, time_to_live })
	}
}

/// Read-only counters exposed by [`LookupCache::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
	/// Calls served from a live entry.
	pub hits: u64,
	/// Calls that invoked the loader.
	pub misses: u64,
	/// Number of live entries at the time of the snapshot.
	pub size: usize,
}

struct CacheEntry<V> {
	value: V,
	inserted_at: OffsetDateTime,
	last_accessed_at: OffsetDateTime,
}

/// Bounded get-or-compute cache with TTL + LRU eviction and single-flight loads.
pub struct LookupCache<K, V, L>
where
	L: ?Sized + ValueLoader<K, V>,
{
	config: CacheConfig,
	entries: Mutex<HashMap<K, CacheEntry<V>>>,
	inflight: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
	hits: AtomicU64,
	misses: AtomicU64,
	loader: Arc<L>,
}
impl<K, V, L> LookupCache<K, V, L>
where
	K: Clone + Eq + Hash,
	V: Clone,
	L: ?Sized + ValueLoader<K, V>,
{
	/// Creates an empty cache over the provided loader.
	pub fn new(config: CacheConfig, loader: impl Into<Arc<L>>) -> Self {
		Self {
			config,
			entries: Mutex::new(HashMap::new()),
			inflight: Mutex::new(HashMap::new()),
			hits: AtomicU64::new(0),
			misses: AtomicU64::new(0),
			loader: loader.into(),
		}
	}

	/// Returns the cached value for `key`, loading it on a miss.
	pub async fn get(&self, key: &K) -> Result<V> {
		if let Some(value) = self.lookup_fresh(key, OffsetDateTime::now_utc()) {
			return Ok(self.record_hit(value));
		}

		let guard = self.load_guard(key);
		let _inflight = guard.lock().await;

		// Re-check under the guard; a coalesced waiter finds the entry the
		// winning load just inserted.
		if let Some(value) = self.lookup_fresh(key, OffsetDateTime::now_utc()) {
			return Ok(self.record_hit(value));
		}

		const KIND: OpKind = OpKind::LookupLoad;

		self.misses.fetch_add(1, Ordering::Relaxed);
		obs::record_lookup_result(false);

		let span = OpSpan::new(KIND, "get");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.loader.load(key)).await;

		self.release_guard(key, &guard);

		match result {
			Ok(value) => {
				obs::record_op_outcome(KIND, OpOutcome::Success);
				self.insert(key.clone(), value.clone());

				Ok(value)
			},
			Err(e) => {
				obs::record_op_outcome(KIND, OpOutcome::Failure);

				Err(e)
			},
		}
	}

	/// Stores `value` under `key`, replacing any prior entry and evicting the
	/// least-recently-used entries down to capacity.
	pub fn insert(&self, key: K, value: V) {
		let now = OffsetDateTime::now_utc();
		let mut entries = self.entries.lock();

		entries.insert(key, CacheEntry { value, inserted_at: now, last_accessed_at: now });

		Self::evict_over_capacity(&mut entries, self.config.capacity);
	}

	/// Removes the entry for `key`, returning `true` if one existed.
	pub fn invalidate(&self, key: &K) -> bool {
		self.entries.lock().remove(key).is_some()
	}

	/// Returns `true` if a live (non-expired) entry exists without touching it.
	pub fn contains(&self, key: &K) -> bool {
		let now = OffsetDateTime::now_utc();

		self.entries
			.lock()
			.get(key)
			.is_some_and(|entry| now - entry.inserted_at < self.config.time_to_live)
	}

	/// Returns a snapshot of the hit/miss counters and the current size.
	pub fn stats(&self) -> CacheStats {
		CacheStats {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			size: self.entries.lock().len(),
		}
	}

	fn record_hit(&self, value: V) -> V {
		self.hits.fetch_add(1, Ordering::Relaxed);
		obs::record_lookup_result(true);

		value
	}

	fn lookup_fresh(&self, key: &K, now: OffsetDateTime) -> Option<V> {
		let mut entries = self.entries.lock();

		match entries.get_mut(key) {
			Some(entry) if now - entry.inserted_at < self.config.time_to_live => {
				entry.last_accessed_at = now;

				Some(entry.value.clone())
			},
			// Expired entries are reaped lazily on access.
			Some(_) => {
				entries.remove(key);

				None
			},
			None => None,
		}
	}

	fn load_guard(&self, key: &K) -> Arc<AsyncMutex<()>> {
		let mut inflight = self.inflight.lock();

		inflight.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	fn release_guard(&self, key: &K, guard: &Arc<AsyncMutex<()>>) {
		let mut inflight = self.inflight.lock();

		if inflight.get(key).is_some_and(|current| Arc::ptr_eq(current, guard)) {
			inflight.remove(key);
		}
	}

	fn evict_over_capacity(entries: &mut HashMap<K, CacheEntry<V>>, capacity: NonZeroUsize) {
		while entries.len() > capacity.get() {
			let victim = entries
				.iter()
				.min_by_key(|(_, entry)| (entry.last_accessed_at, entry.inserted_at))
				.map(|(key, _)| key.clone());
			let Some(victim) = victim else { break };

			entries.remove(&victim);
		}
	}
}
impl<K, V, L> Debug for LookupCache<K, V, L>
where
	K: Clone + Eq + Hash,
	V: Clone,
	L: ?Sized + ValueLoader<K, V>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LookupCache")
			.field("capacity", &self.config.capacity)
			.field("time_to_live", &self.config.time_to_live)
			.field("stats", &self.stats())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicU32;
	// self
	use super::*;

	struct CountingLoader {
		calls: AtomicU32,
		delay: std::time::Duration,
	}
	impl CountingLoader {
		fn new() -> Self {
			Self { calls: AtomicU32::new(0), delay: std::time::Duration::ZERO }
		}

		fn with_delay(delay: std::time::Duration) -> Self {
			Self { calls: AtomicU32::new(0), delay }
		}

		fn calls(&self) -> u32 {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl ValueLoader<String, String> for CountingLoader {
		fn load<'a>(&'a self, key: &'a String) -> LoadFuture<'a, String> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move {
				if !self.delay.is_zero() {
					tokio::time::sleep(self.delay).await;
				}

				Ok(format!("value-of-{key}"))
			})
		}
	}

	fn config(capacity: usize, ttl: Duration) -> CacheConfig {
		CacheConfig::new(
			NonZeroUsize::new(capacity).expect("Capacity fixture should be non-zero."),
			ttl,
		)
		.expect("Config fixture should be valid.")
	}

	#[test]
	fn config_rejects_negative_ttl() {
		let capacity = NonZeroUsize::new(4).expect("Capacity fixture should be non-zero.");

		assert!(matches!(
			CacheConfig::new(capacity, Duration::seconds(-1)),
			Err(ConfigError::NegativeTimeToLive)
		));
	}

	#[tokio::test]
	async fn repeated_get_within_ttl_loads_once() {
		let loader = Arc::new(CountingLoader::new());
		let cache: LookupCache<String, String, CountingLoader> = LookupCache::new(config(4, Duration::minutes(5)), loader.clone());
		let key = "alpha".to_string();
		let first = cache.get(&key).await.expect("First get should load.");
		let second = cache.get(&key).await.expect("Second get should hit.");

		assert_eq!(first, "value-of-alpha");
		assert_eq!(first, second);
		assert_eq!(loader.calls(), 1);
		assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, size: 1 });
	}

	#[tokio::test]
	async fn zero_ttl_treats_entries_as_absent() {
		let loader = Arc::new(CountingLoader::new());
		let cache: LookupCache<String, String, CountingLoader> = LookupCache::new(config(4, Duration::ZERO), loader.clone());
		let key = "beta".to_string();

		cache.get(&key).await.expect("First get should load.");
		cache.get(&key).await.expect("Second get should reload.");

		assert_eq!(loader.calls(), 2);
	}

	#[tokio::test]
	async fn lru_eviction_spares_recently_accessed_entries() {
		let loader = Arc::new(CountingLoader::new());
		let cache: LookupCache<String, String, CountingLoader> = LookupCache::new(config(2, Duration::minutes(5)), loader.clone());
		let (a, b, c) = ("a".to_string(), "b".to_string(), "c".to_string());

		cache.get(&a).await.expect("Load of `a` should succeed.");
		cache.get(&b).await.expect("Load of `b` should succeed.");
		cache.get(&a).await.expect("Hit on `a` should succeed.");
		cache.get(&c).await.expect("Load of `c` should succeed.");

		// `b` is the least recently used entry and must be the one evicted.
		assert!(cache.contains(&a));
		assert!(!cache.contains(&b));
		assert!(cache.contains(&c));
		assert_eq!(cache.stats().size, 2);
	}

	#[tokio::test(start_paused = true)]
	async fn concurrent_misses_for_one_key_are_coalesced() {
		let loader = Arc::new(CountingLoader::with_delay(std::time::Duration::from_millis(50)));
		let cache: LookupCache<String, String, CountingLoader> = LookupCache::new(config(4, Duration::minutes(5)), loader.clone());
		let key = "gamma".to_string();
		let (first, second) = tokio::join!(cache.get(&key), cache.get(&key));

		assert_eq!(first.expect("First concurrent get should succeed."), "value-of-gamma");
		assert_eq!(second.expect("Second concurrent get should succeed."), "value-of-gamma");
		assert_eq!(loader.calls(), 1);
	}

	#[tokio::test]
	async fn invalidate_forces_a_reload() {
		let loader = Arc::new(CountingLoader::new());
		let cache: LookupCache<String, String, CountingLoader> = LookupCache::new(config(4, Duration::minutes(5)), loader.clone());
		let key = "delta".to_string();

		cache.get(&key).await.expect("First get should load.");

		assert!(cache.invalidate(&key));
		assert!(!cache.invalidate(&key));

		cache.get(&key).await.expect("Get after invalidation should reload.");

		assert_eq!(loader.calls(), 2);
	}

	#[tokio::test]
	async fn insert_replaces_and_respects_capacity() {
		let loader = Arc::new(CountingLoader::new());
		let cache: LookupCache<String, String, CountingLoader> = LookupCache::new(config(2, Duration::minutes(5)), loader.clone());

		cache.insert("x".to_string(), "one".to_string());
		cache.insert("x".to_string(), "two".to_string());
		cache.insert("y".to_string(), "three".to_string());
		cache.insert("z".to_string(), "four".to_string());

		assert_eq!(cache.stats().size, 2);
		assert_eq!(cache.get(&"z".to_string()).await.expect("Fresh insert should hit."), "four");
		assert_eq!(loader.calls(), 0);
	}
}
