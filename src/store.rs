//! Key-value backing contract and the in-memory implementation.
//!
//! [`KeyValueBackend`] is the minimal capability set the lookup layer needs
//! from an upstream secret store: `get` yields a typed absence rather than an
//! error so callers can distinguish a missing key from a transport failure,
//! and `set` acknowledges a write. [`BackendLoader`] adapts a boundary-wrapped
//! backend into the [`ValueLoader`](crate::cache::ValueLoader) contract.

// self
use crate::{
	_prelude::*,
	boundary::ClientBoundary,
	cache::{LoadFuture, ValueLoader},
};

/// Boxed future returned by [`KeyValueBackend`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Backing interface for upstream key-value lookups.
pub trait KeyValueBackend
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`; `None` marks a typed absence.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores `value` under `key`, replacing any prior value.
	fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`KeyValueBackend`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend rejected the key as unusable.
	#[error("Backend rejected key `{key}`.")]
	InvalidKey {
		/// The rejected key.
		key: String,
	},
}

/// Thread-safe backend that keeps values in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend(Arc<RwLock<HashMap<String, String>>>);
impl MemoryBackend {
	fn get_now(map: Arc<RwLock<HashMap<String, String>>>, key: String) -> Option<String> {
		map.read().get(&key).cloned()
	}

	fn set_now(map: Arc<RwLock<HashMap<String, String>>>, key: String, value: String) {
		map.write().insert(key, value);
	}
}
impl KeyValueBackend for MemoryBackend {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Ok(Self::get_now(map, key)) })
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();
		let value = value.to_owned();

		Box::pin(async move {
			Self::set_now(map, key, value);

			Ok(())
		})
	}
}

/// Boundary-backed loader mapping typed absences to
/// [`Error::MissingValue`](crate::error::Error::MissingValue).
pub struct BackendLoader<B>
where
	B: KeyValueBackend,
{
	boundary: Arc<ClientBoundary<B>>,
}
impl<B> BackendLoader<B>
where
	B: KeyValueBackend,
{
	/// Creates a loader over a boundary-wrapped backend.
	pub fn new(boundary: impl Into<Arc<ClientBoundary<B>>>) -> Self {
		Self { boundary: boundary.into() }
	}

	/// Writes through to the backend via the boundary.
	pub async fn set(&self, key: &str, value: &str) -> Result<()> {
		self.boundary.invoke_async(|backend| Ok::<_, StoreError>(backend.set(key, value))).await
	}
}
impl<B> ValueLoader<String, String> for BackendLoader<B>
where
	B: KeyValueBackend,
{
	fn load<'a>(&'a self, key: &'a String) -> LoadFuture<'a, String> {
		Box::pin(async move {
			self.boundary
				.invoke_async(|backend| Ok::<_, StoreError>(backend.get(key)))
				.await?
				.ok_or_else(|| Error::MissingValue { key: key.clone() })
		})
	}
}
