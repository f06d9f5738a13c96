//! Single-flight credential cache.
//!
//! The cache holds at most one [`Credential`] and guarantees at most one
//! in-flight exchange per instance. Callers on the fast path never suspend: a
//! cached credential that is fresh at `now + lead_time` is returned without
//! touching the network. Everyone else serializes on the refresh gate and
//! re-checks the slot before exchanging, so a burst of expired callers
//! piggy-backs on a single authentication call instead of stampeding the
//! token endpoint. A failed exchange leaves the slot untouched; only the
//! callers of that attempt observe the error and the next call starts fresh.

// self
use crate::{
	_prelude::*,
	auth::{
		credential::{Credential, CredentialStatus},
		exchange::CredentialExchange,
		secret::Secret,
	},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Default safety margin a returned token must remain valid for.
pub const DEFAULT_LEAD_TIME: Duration = Duration::seconds(30);

/// Expiry-aware cache guaranteeing single-flight refresh.
pub struct CredentialCache<X>
where
	X: ?Sized + CredentialExchange,
{
	lead_time: Duration,
	slot: RwLock<Option<Credential>>,
	refresh_gate: AsyncMutex<()>,
	exchange: Arc<X>,
}
impl<X> CredentialCache<X>
where
	X: ?Sized + CredentialExchange,
{
	/// Creates an empty cache backed by the provided exchange transport.
	pub fn new(exchange: impl Into<Arc<X>>) -> Self {
		Self {
			lead_time: DEFAULT_LEAD_TIME,
			slot: RwLock::new(None),
			refresh_gate: AsyncMutex::new(()),
			exchange: exchange.into(),
		}
	}

	/// Overrides the lead time (defaults to 30 seconds).
	pub fn with_lead_time(mut self, lead_time: Duration) -> Self {
		self.lead_time = if lead_time.is_negative() { Duration::ZERO } else { lead_time };

		self
	}

	/// Returns a bearer token guaranteed to outlive `now + lead_time`.
	pub async fn valid_token(&self) -> Result<Secret> {
		if let Some(token) = self.fresh_token_at(OffsetDateTime::now_utc()) {
			return Ok(token);
		}

		let _refresh = self.refresh_gate.lock().await;

		// Re-check under the gate; a concurrent caller may have completed a
		// refresh while this one waited for the lock.
		if let Some(token) = self.fresh_token_at(OffsetDateTime::now_utc()) {
			return Ok(token);
		}

		const KIND: OpKind = OpKind::CredentialRefresh;

		let span = OpSpan::new(KIND, "valid_token");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		match span.instrument(self.exchange.exchange()).await {
			Ok(fresh) => {
				obs::record_op_outcome(KIND, OpOutcome::Success);

				let token = fresh.access_token.clone();

				*self.slot.write() = Some(fresh);

				Ok(token)
			},
			Err(e) => {
				obs::record_op_outcome(KIND, OpOutcome::Failure);

				Err(e)
			},
		}
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> CredentialStatus {
		match self.slot.read().as_ref() {
			None => CredentialStatus::Empty,
			Some(credential) if credential.is_fresh_at(instant, self.lead_time) =>
				CredentialStatus::Valid,
			Some(_) => CredentialStatus::Expired,
		}
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> CredentialStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns a copy of the cached credential, if any.
	pub fn snapshot(&self) -> Option<Credential> {
		self.slot.read().clone()
	}

	fn fresh_token_at(&self, now: OffsetDateTime) -> Option<Secret> {
		self.slot
			.read()
			.as_ref()
			.filter(|credential| credential.is_fresh_at(now, self.lead_time))
			.map(|credential| credential.access_token.clone())
	}
}
impl<X> Debug for CredentialCache<X>
where
	X: ?Sized + CredentialExchange,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialCache")
			.field("lead_time", &self.lead_time)
			.field("status", &self.status())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicU32, Ordering},
	};
	// self
	use super::*;
	use crate::{auth::exchange::ExchangeFuture, error::AuthenticationError};

	struct ScriptedExchange {
		calls: AtomicU32,
		script: Mutex<VecDeque<Result<Credential>>>,
	}
	impl ScriptedExchange {
		fn new(script: impl IntoIterator<Item = Result<Credential>>) -> Self {
			Self { calls: AtomicU32::new(0), script: Mutex::new(script.into_iter().collect()) }
		}

		fn calls(&self) -> u32 {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl CredentialExchange for ScriptedExchange {
		fn exchange(&self) -> ExchangeFuture<'_> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let next = self
				.script
				.lock()
				.pop_front()
				.expect("Scripted exchange should not be called more times than scripted.");

			Box::pin(async move { next })
		}
	}

	fn credential(token: &str, expires_in_secs: i64) -> Credential {
		Credential::issue(token, None, expires_in_secs, Duration::ZERO, OffsetDateTime::now_utc())
			.expect("Credential fixture should issue successfully.")
	}

	fn rejected() -> Error {
		AuthenticationError::Rejected { status: 401, reason: "invalid_grant".into() }.into()
	}

	#[tokio::test]
	async fn fresh_credential_short_circuits_the_exchange() {
		let exchange = Arc::new(ScriptedExchange::new([Ok(credential("one", 3_600))]));
		let cache: CredentialCache<ScriptedExchange> = CredentialCache::new(exchange.clone());

		assert_eq!(cache.status(), CredentialStatus::Empty);
		assert_eq!(cache.valid_token().await.expect("First call should refresh.").expose(), "one");
		assert_eq!(cache.valid_token().await.expect("Second call should hit.").expose(), "one");
		assert_eq!(exchange.calls(), 1);
		assert_eq!(cache.status(), CredentialStatus::Valid);
	}

	#[tokio::test]
	async fn expired_credential_triggers_replacement() {
		let exchange = Arc::new(ScriptedExchange::new([
			Ok(credential("short", 10)),
			Ok(credential("fresh", 3_600)),
		]));
		let cache: CredentialCache<ScriptedExchange> = CredentialCache::new(exchange.clone());

		// 10s lifetime is inside the 30s lead window, so the first credential
		// is already considered expired on the next read.
		assert_eq!(cache.valid_token().await.expect("First call should refresh.").expose(), "short");
		assert_eq!(cache.status(), CredentialStatus::Expired);
		assert_eq!(cache.valid_token().await.expect("Second call should refresh.").expose(), "fresh");
		assert_eq!(exchange.calls(), 2);
	}

	#[tokio::test]
	async fn failed_exchange_leaves_cache_retryable() {
		let exchange =
			Arc::new(ScriptedExchange::new([Err(rejected()), Ok(credential("second", 3_600))]));
		let cache: CredentialCache<ScriptedExchange> = CredentialCache::new(exchange.clone());
		let err = cache.valid_token().await.expect_err("First attempt should fail.");

		assert!(matches!(err, Error::Authentication(AuthenticationError::Rejected { .. })));
		assert_eq!(cache.status(), CredentialStatus::Empty);
		assert!(cache.snapshot().is_none());

		assert_eq!(cache.valid_token().await.expect("Retry should succeed.").expose(), "second");
		assert_eq!(exchange.calls(), 2);
	}
}
