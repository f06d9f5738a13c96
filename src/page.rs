//! Cursor-paginated fetch primitives.
//!
//! The module exposes the page data model ([`Cursor`], [`Page`],
//! [`PageResponse`]) alongside the [`PageSource`] transport contract and the
//! [`PageDecoder`] body contract so downstream crates can integrate custom
//! transports without losing the stream's retry behavior. The actual pull
//! sequence lives in [`stream::PageStream`].

pub mod stream;

pub use stream::*;

// std
use std::marker::PhantomData;
// crates.io
use rand::Rng;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, DecodeError},
};

/// Boxed future returned by [`PageSource::fetch`].
pub type PageFuture<'a> =
	Pin<Box<dyn Future<Output = std::result::Result<PageResponse, BoxError>> + 'a + Send>>;

/// Opaque continuation marker; either a URL or a provider token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor(String);
impl Cursor {
	/// Wraps an opaque continuation value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw continuation value.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl From<Url> for Cursor {
	fn from(url: Url) -> Self {
		Self(url.into())
	}
}
impl Display for Cursor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// One decoded page handed to the consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
	/// Items carried by this page.
	pub items: Vec<T>,
	/// Continuation for the following page; `None` marks the clean end.
	pub next: Option<Cursor>,
}

/// Transport-level outcome of fetching one cursor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageResponse {
	/// Upstream signaled throttling; the same cursor must be retried.
	Throttled {
		/// Server-provided wait hint, when present.
		retry_after: Option<Duration>,
	},
	/// Upstream returned a payload for the cursor.
	Received {
		/// Raw response body, decoded later against the expected schema.
		body: Vec<u8>,
		/// Continuation extracted from response metadata (e.g. a `Link` header).
		next: Option<Cursor>,
	},
}

/// Transport contract for cursor-paginated resources.
///
/// Implementations resolve one cursor to a [`PageResponse`] and box native
/// failures so the stream's [`ClientBoundary`](crate::boundary::ClientBoundary)
/// can normalize them.
pub trait PageSource
where
	Self: Send + Sync,
{
	/// Issues the request for `cursor`.
	fn fetch<'a>(&'a self, cursor: &Cursor) -> PageFuture<'a>;
}

/// Items plus the body-level continuation produced by a [`PageDecoder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedPage<T> {
	/// Decoded items.
	pub items: Vec<T>,
	/// Continuation carried inside the body, if the schema defines one.
	pub next: Option<Cursor>,
}

/// Schema contract applied to each page body.
pub trait PageDecoder<T>
where
	Self: Send + Sync,
{
	/// Decodes `body`, naming the offending field on mismatch.
	fn decode(&self, body: &[u8]) -> Result<DecodedPage<T>, DecodeError>;
}

/// Vendor envelope that knows how to split itself into items + continuation.
pub trait PageEnvelope<T> {
	/// Consumes the envelope into the decoded page shape.
	fn into_page(self) -> DecodedPage<T>;
}

/// [`PageDecoder`] for JSON bodies deserialized into an envelope `E`.
pub struct JsonDecoder<E>(PhantomData<fn() -> E>);
impl<E> JsonDecoder<E> {
	/// Creates the decoder.
	pub fn new() -> Self {
		Self(PhantomData)
	}
}
impl<E> Default for JsonDecoder<E> {
	fn default() -> Self {
		Self::new()
	}
}
impl<E> Debug for JsonDecoder<E> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("JsonDecoder(..)")
	}
}
impl<T, E> PageDecoder<T> for JsonDecoder<E>
where
	E: DeserializeOwned + PageEnvelope<T>,
{
	fn decode(&self, body: &[u8]) -> Result<DecodedPage<T>, DecodeError> {
		let mut deserializer = serde_json::Deserializer::from_slice(body);
		let envelope: E =
			serde_path_to_error::deserialize(&mut deserializer).map_err(DecodeError::new)?;

		Ok(envelope.into_page())
	}
}

/// Request template rendered into the initial cursor of a sequence.
#[derive(Clone, Debug)]
pub struct PageRequest {
	base: Url,
	path: String,
	query: Vec<(String, String)>,
}
impl PageRequest {
	/// Creates a template rooted at `base`.
	pub fn new(base: Url) -> Self {
		Self { base, path: String::new(), query: Vec::new() }
	}

	/// Sets the resource path joined onto the base URL.
	pub fn path(mut self, path: impl Into<String>) -> Self {
		self.path = path.into();

		self
	}

	/// Appends one query pair.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Renders the template into the first cursor of the sequence.
	pub fn initial_cursor(&self) -> Result<Cursor, ConfigError> {
		let mut url = if self.path.is_empty() {
			self.base.clone()
		} else {
			self.base.join(&self.path).map_err(|source| ConfigError::InvalidRequestUrl { source })?
		};

		if !self.query.is_empty() {
			url.query_pairs_mut()
				.extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
		}

		Ok(url.into())
	}
}

/// Backoff applied when upstream throttles and supplies no wait hint.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
	/// Maximum throttled retries per cursor before giving up.
	pub max_retries: u32,
	/// First fallback delay.
	pub base_delay: Duration,
	/// Upper bound for fallback delays.
	pub max_delay: Duration,
}
impl RetryPolicy {
	/// Overrides the retry cap (defaults to 5).
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the first fallback delay (defaults to 1 second).
	pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
		self.base_delay = if base_delay.is_negative() { Duration::ZERO } else { base_delay };

		self
	}

	/// Overrides the delay cap (defaults to 30 seconds).
	pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
		self.max_delay = if max_delay.is_negative() { Duration::ZERO } else { max_delay };

		self
	}

	/// Computes the fallback delay for the n-th throttled attempt (1-based),
	/// doubling up to the cap with up to 10% jitter on top.
	pub fn backoff(&self, attempt: u32) -> Duration {
		let base_ms = self.base_delay.whole_milliseconds().max(0) as u64;
		let max_ms = self.max_delay.whole_milliseconds().max(0) as u64;
		let exponent = attempt.saturating_sub(1).min(20);
		let delay_ms = base_ms.saturating_mul(1_u64 << exponent).min(max_ms);
		let jitter_range = delay_ms / 10;
		let jitter =
			if jitter_range > 0 { rand::rng().random_range(0..jitter_range) } else { 0 };

		Duration::milliseconds(delay_ms.saturating_add(jitter) as i64)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 5,
			base_delay: Duration::seconds(1),
			max_delay: Duration::seconds(30),
		}
	}
}
