//! Optional observability helpers for broker operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `upstream_broker.op` with the `op`
//!   (operation) and `stage` (call site) fields, plus throttle-wait warnings.
//! - Enable `metrics` to increment the `upstream_broker_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`, and the
//!   `upstream_broker_lookup_total` counter labeled by `result`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Broker operations observed by the instrumentation helpers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Credential exchange performed by the single-flight cache.
	CredentialRefresh,
	/// Loader invocation performed by the lookup cache.
	LookupLoad,
	/// One page request issued by a page stream.
	PageFetch,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::CredentialRefresh => "credential_refresh",
			OpKind::LookupLoad => "lookup_load",
			OpKind::PageFetch => "page_fetch",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a broker helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Warns about an upcoming throttle wait (when tracing is enabled).
pub fn note_throttled(wait: Duration, attempt: u32) {
	#[cfg(feature = "tracing")]
	{
		::tracing::warn!(
			wait_secs = wait.whole_seconds(),
			attempt,
			"Upstream signaled throttling; delaying the retry."
		);
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (wait, attempt);
	}
}
