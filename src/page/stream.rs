//! Lazy, forward-only page sequence with rate-limit-aware retry.
//!
//! [`PageStream`] pulls decoded pages strictly in cursor order through a
//! [`ClientBoundary`]. A throttled attempt waits out the server hint (or the
//! policy's exponential fallback), retries the same cursor without emitting
//! anything, and gives up with
//! [`Error::RetryCapExceeded`](crate::error::Error::RetryCapExceeded) once the
//! per-cursor cap is spent. Any terminal failure fuses the stream; an absent
//! continuation ends it cleanly with no further request. Dropping the stream
//! abandons whatever request is in flight.

// std
use std::marker::PhantomData;
// self
use crate::{
	_prelude::*,
	boundary::ClientBoundary,
	obs::{self, OpKind, OpOutcome, OpSpan},
	page::{Cursor, Page, PageDecoder, PageResponse, PageSource, RetryPolicy},
};

/// Pull-based sequence of decoded pages. Non-restartable by construction.
pub struct PageStream<T, S, D>
where
	S: PageSource,
	D: PageDecoder<T>,
{
	boundary: Arc<ClientBoundary<S>>,
	decoder: D,
	policy: RetryPolicy,
	cursor: Option<Cursor>,
	finished: bool,
	_marker: PhantomData<fn() -> T>,
}
impl<T, S, D> PageStream<T, S, D>
where
	S: PageSource,
	D: PageDecoder<T>,
{
	/// Creates a sequence starting from `initial`, fetching through `boundary`.
	pub fn new(boundary: impl Into<Arc<ClientBoundary<S>>>, initial: Cursor, decoder: D) -> Self {
		Self {
			boundary: boundary.into(),
			decoder,
			policy: RetryPolicy::default(),
			cursor: Some(initial),
			finished: false,
			_marker: PhantomData,
		}
	}

	/// Overrides the throttle retry policy.
	pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Returns `true` once the sequence has ended, cleanly or by failure.
	pub fn is_finished(&self) -> bool {
		self.finished
	}

	/// Pulls the next page.
	///
	/// `Ok(None)` marks the clean end of the sequence. Any `Err` is terminal:
	/// the stream is fused and every later call returns `Ok(None)`.
	pub async fn try_next(&mut self) -> Result<Option<Page<T>>> {
		if self.finished {
			return Ok(None);
		}

		let Some(cursor) = self.cursor.clone() else {
			self.finished = true;

			return Ok(None);
		};

		match self.advance(&cursor).await {
			Ok(page) => Ok(Some(page)),
			Err(e) => {
				self.finished = true;

				Err(e)
			},
		}
	}

	async fn advance(&mut self, cursor: &Cursor) -> Result<Page<T>> {
		const KIND: OpKind = OpKind::PageFetch;

		let mut throttled = 0_u32;

		loop {
			let span = OpSpan::new(KIND, "try_next");

			obs::record_op_outcome(KIND, OpOutcome::Attempt);

			let outcome = span
				.instrument(self.boundary.invoke_async(|source| Ok::<_, BoxError>(source.fetch(cursor))))
				.await;
			let response = match outcome {
				Ok(response) => {
					obs::record_op_outcome(KIND, OpOutcome::Success);

					response
				},
				Err(e) => {
					obs::record_op_outcome(KIND, OpOutcome::Failure);

					return Err(e);
				},
			};

			match response {
				PageResponse::Throttled { retry_after } => {
					throttled += 1;

					if throttled > self.policy.max_retries {
						return Err(Error::RetryCapExceeded { attempts: throttled });
					}

					let wait = retry_after.unwrap_or_else(|| self.policy.backoff(throttled));

					obs::note_throttled(wait, throttled);
					tokio::time::sleep(to_std_duration(wait)).await;
					// Same cursor again; no page is emitted for this attempt.
				},
				PageResponse::Received { body, next } => {
					let decoded = self.decoder.decode(&body)?;
					// A continuation carried in the body wins over one derived
					// from response headers.
					let next = decoded.next.or(next);

					self.cursor = next.clone();

					if self.cursor.is_none() {
						self.finished = true;
					}

					return Ok(Page { items: decoded.items, next });
				},
			}
		}
	}
}
impl<T, S, D> Debug for PageStream<T, S, D>
where
	S: PageSource,
	D: PageDecoder<T>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PageStream")
			.field("cursor", &self.cursor)
			.field("finished", &self.finished)
			.finish()
	}
}
