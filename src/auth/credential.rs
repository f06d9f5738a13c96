//! Immutable credential snapshots and freshness arithmetic.

// self
use crate::{_prelude::*, auth::secret::Secret, error::ConfigError};

/// Default skew subtracted from a server-reported lifetime at issuance.
pub const DEFAULT_EXPIRY_SKEW: Duration = Duration::seconds(30);

/// Lifecycle states observed by [`CredentialCache`](crate::auth::CredentialCache) callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialStatus {
	/// No credential has been cached yet.
	Empty,
	/// The cached credential is fresh at `now + lead_time`.
	Valid,
	/// The cached credential fails the lead-time check and must be replaced.
	Expired,
}

/// Immutable snapshot of one issued credential.
///
/// A refresh always produces a wholly new value; nothing mutates a stored
/// snapshot in place.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
	/// Bearer secret handed to transports; callers must avoid logging it.
	pub access_token: Secret,
	/// Refresh secret, if the provider issued one.
	pub refresh_token: Option<Secret>,
	/// Instant the exchange completed.
	pub issued_at: OffsetDateTime,
	/// Skew-adjusted expiry instant.
	pub expires_at: OffsetDateTime,
}
impl Credential {
	/// Builds a snapshot from an exchange result, applying the skew margin.
	///
	/// The expiry is `now + (expires_in - skew)` seconds, defending against
	/// clock drift and tokens that die mid-request. A non-positive
	/// `expires_in` is rejected.
	pub fn issue(
		access_token: impl Into<String>,
		refresh_token: Option<String>,
		expires_in_secs: i64,
		skew: Duration,
		now: OffsetDateTime,
	) -> Result<Self, ConfigError> {
		if expires_in_secs <= 0 {
			return Err(ConfigError::NonPositiveExpiresIn);
		}

		let expires_at = now + (Duration::seconds(expires_in_secs) - skew);

		Ok(Self {
			access_token: Secret::new(access_token),
			refresh_token: refresh_token.map(Secret::new),
			issued_at: now,
			expires_at,
		})
	}

	/// Returns `true` if the credential is usable at `now` with `lead_time` to spare.
	///
	/// The check is strict: a credential expiring exactly at `now + lead_time`
	/// counts as expired, so a token handed out is never stale at the moment of
	/// return.
	pub fn is_fresh_at(&self, now: OffsetDateTime, lead_time: Duration) -> bool {
		now + lead_time < self.expires_at
	}

	/// Convenience helper that evaluates freshness against the current clock.
	pub fn is_fresh(&self, lead_time: Duration) -> bool {
		self.is_fresh_at(OffsetDateTime::now_utc(), lead_time)
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const LEAD: Duration = Duration::seconds(30);

	fn credential_expiring_in(secs: i64, now: OffsetDateTime) -> Credential {
		Credential {
			access_token: Secret::new("token"),
			refresh_token: None,
			issued_at: now,
			expires_at: now + Duration::seconds(secs),
		}
	}

	#[test]
	fn lead_time_window_classifies_freshness() {
		let now = macros::datetime!(2025-06-01 12:00 UTC);

		assert!(!credential_expiring_in(20, now).is_fresh_at(now, LEAD));
		assert!(credential_expiring_in(40, now).is_fresh_at(now, LEAD));
		// The boundary instant counts as expired.
		assert!(!credential_expiring_in(30, now).is_fresh_at(now, LEAD));
	}

	#[test]
	fn issue_applies_skew_to_reported_lifetime() {
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let credential = Credential::issue("t", Some("r".into()), 120, DEFAULT_EXPIRY_SKEW, now)
			.expect("Positive lifetime should issue successfully.");

		assert_eq!(credential.expires_at, now + Duration::seconds(90));
		assert_eq!(credential.issued_at, now);
		assert!(credential.refresh_token.is_some());
	}

	#[test]
	fn issue_rejects_non_positive_lifetime() {
		let now = OffsetDateTime::now_utc();

		assert!(matches!(
			Credential::issue("t", None, 0, DEFAULT_EXPIRY_SKEW, now),
			Err(ConfigError::NonPositiveExpiresIn)
		));
	}

	#[test]
	fn debug_redacts_secrets() {
		let now = OffsetDateTime::now_utc();
		let rendered = format!("{:?}", credential_expiring_in(60, now));

		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("token"));
	}
}
