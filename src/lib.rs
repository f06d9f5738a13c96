//! Resilient upstream access for Rust—fault-normalized client boundaries, single-flight
//! credential caches, TTL lookup caches, and rate-limit-aware pagination in one crate built
//! for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod boundary;
pub mod cache;
pub mod error;
#[cfg(feature = "reqwest")] pub mod http;
pub mod obs;
pub mod page;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{CredentialCache, ExchangeConfig},
		http::ReqwestExchange,
	};

	/// Credential cache type alias used by reqwest-backed integration tests.
	pub type ReqwestTestCredentialCache = CredentialCache<ReqwestExchange>;

	/// Builds an [`ExchangeConfig`] pointed at a mock token endpoint with fixture credentials.
	pub fn test_exchange_config(token_endpoint: &str) -> ExchangeConfig {
		ExchangeConfig::builder(
			Url::parse(token_endpoint).expect("Mock token endpoint should parse successfully."),
		)
		.username("svc-user")
		.password("svc-pass")
		.client_id("client-id")
		.client_secret("client-secret")
		.build()
		.expect("Exchange config fixture should build successfully.")
	}

	/// Constructs a [`CredentialCache`] backed by the crate's reqwest exchange transport.
	pub fn build_reqwest_credential_cache(token_endpoint: &str) -> ReqwestTestCredentialCache {
		CredentialCache::new(ReqwestExchange::new(test_exchange_config(token_endpoint)))
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		num::NonZeroUsize,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{BoxError, Error, Result};

	/// Converts a signed [`Duration`] into the non-negative form timers require.
	pub fn to_std_duration(duration: Duration) -> std::time::Duration {
		std::time::Duration::try_from(duration).unwrap_or(std::time::Duration::ZERO)
	}
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use httpmock as _;
