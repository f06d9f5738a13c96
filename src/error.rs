//! Broker-level error taxonomy shared across boundaries, caches, and page streams.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed native cause attached to normalized faults.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
///
/// Callers only ever observe these kinds; native handle failures are translated
/// at the [`ClientBoundary`](crate::boundary::ClientBoundary) with the original
/// cause attached for diagnostics.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Fault normalized at a client boundary.
	#[error(transparent)]
	Boundary(#[from] BoundaryError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Response body failed schema validation.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Credential exchange failed; the cache is left in its prior state.
	#[error(transparent)]
	Authentication(#[from] AuthenticationError),

	/// Requested key is absent upstream; distinguishable from transport failure.
	#[error("Key `{key}` is absent upstream.")]
	MissingValue {
		/// The key that produced no value.
		key: String,
	},
	/// Upstream signaled throttling for the current attempt.
	#[error("Upstream signaled throttling.")]
	RateLimited {
		/// Wait hint supplied by the server, when present.
		retry_after: Option<Duration>,
	},
	/// Rate-limit retries were exhausted for a single cursor.
	#[error("Rate-limit retries exhausted after {attempts} attempts for the current cursor.")]
	RetryCapExceeded {
		/// Number of throttled attempts observed before giving up.
		attempts: u32,
	},
}

/// Faults normalized by a [`ClientBoundary`](crate::boundary::ClientBoundary).
#[derive(Debug, ThisError)]
pub enum BoundaryError {
	/// Operation failed synchronously inside the boundary.
	#[error("Synchronous fault in `{context}`.")]
	Sync {
		/// Boundary target label identifying the call site.
		context: &'static str,
		/// Original native cause.
		#[source]
		source: BoxError,
	},
	/// Pending operation failed while being awaited.
	#[error("Asynchronous fault in `{context}`.")]
	Async {
		/// Boundary target label identifying the call site.
		context: &'static str,
		/// Original native cause.
		#[source]
		source: BoxError,
	},
}
impl BoundaryError {
	/// Returns the boundary target label the fault was observed at.
	pub fn context(&self) -> &'static str {
		match self {
			Self::Sync { context, .. } | Self::Async { context, .. } => context,
		}
	}
}

/// Schema validation failure naming the offending location in the body.
#[derive(Debug, ThisError)]
#[error("Response body failed schema validation at `{path}`.")]
pub struct DecodeError {
	/// Dotted path to the offending field.
	pub path: String,
	/// Structured parsing failure.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
}
impl DecodeError {
	/// Captures the offending path from a structured parse failure.
	pub fn new(source: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self { path: source.path().to_string(), source }
	}
}

/// Credential exchange failures surfaced to the waiting callers of one attempt.
#[derive(Debug, ThisError)]
pub enum AuthenticationError {
	/// Token endpoint rejected the exchange.
	#[error("Credential exchange rejected with status {status}: {reason}.")]
	Rejected {
		/// HTTP status returned by the token endpoint.
		status: u16,
		/// Provider-supplied reason string, when present.
		reason: String,
	},
	/// Token endpoint responded with a body that does not match the exchange contract.
	#[error("Credential exchange returned a malformed response.")]
	MalformedResponse {
		/// Structured parsing failure naming the offending field.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Transport-level failure while calling the token endpoint.
	#[error("Network error occurred while calling the token endpoint.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl AuthenticationError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}
}

/// Configuration and validation failures raised by builders.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Request template produced an invalid URL.
	#[error("Request template produced an invalid URL.")]
	InvalidRequestUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Cache time-to-live must not be negative.
	#[error("Cache time-to-live must not be negative.")]
	NegativeTimeToLive,
	/// Exchange response reported a non-positive token lifetime.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn decode_error_names_offending_path() {
		#[derive(Debug, Deserialize)]
		struct Envelope {
			#[allow(dead_code)]
			items: Vec<u32>,
		}

		let deserializer = &mut serde_json::Deserializer::from_str(r#"{"items": "oops"}"#);
		let failure = serde_path_to_error::deserialize::<_, Envelope>(deserializer)
			.expect_err("Mismatched body should fail to decode.");
		let error = DecodeError::new(failure);

		assert_eq!(error.path, "items");
		assert!(error.to_string().contains("items"));
	}

	#[test]
	fn boundary_error_keeps_original_cause() {
		let native = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer hung up");
		let error: Error =
			BoundaryError::Async { context: "vault.get", source: Box::new(native) }.into();

		assert_eq!(error.to_string(), "Asynchronous fault in `vault.get`.");

		// The transparent wrapper forwards `source` straight to the native cause.
		let source = StdError::source(&error)
			.expect("Normalized fault should expose the native cause chain.");

		assert!(source.to_string().contains("peer hung up"));
	}
}
