//! Reqwest-backed transports for page sources and credential exchanges.
//!
//! The module wires the crate's transport contracts onto [`ReqwestClient`]:
//! [`ReqwestPageSource`] fetches cursor URLs (bearer tokens drawn from a
//! [`CredentialCache`], or a static basic credential), translating `429`
//! responses into [`PageResponse::Throttled`] with the parsed `Retry-After`
//! hint and extracting `Link`-header continuations; [`ReqwestExchange`]
//! performs the password-grant form POST behind [`CredentialExchange`].

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::{
	StatusCode,
	header::{AUTHORIZATION, HeaderMap, LINK, RETRY_AFTER},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	auth::{
		Credential, CredentialCache, CredentialExchange, ExchangeConfig, ExchangeFuture,
		ExchangeRequest, ExchangeResponse, Secret,
	},
	error::AuthenticationError,
	page::{Cursor, PageFuture, PageResponse, PageSource},
};

/// Upstream answered a page request with a status the stream cannot act on.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unexpected status {status} from upstream.")]
pub struct UnexpectedStatus {
	/// Raw HTTP status code.
	pub status: u16,
}

/// Authorization applied to every page request.
#[derive(Clone)]
pub enum PageAuth {
	/// No authorization header.
	None,
	/// Bearer tokens drawn from a single-flight credential cache per request.
	Bearer(Arc<CredentialCache<dyn CredentialExchange>>),
	/// Static basic credential rendered once per request.
	Basic {
		/// Basic auth username.
		username: String,
		/// Basic auth password.
		password: Secret,
	},
}
impl Debug for PageAuth {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::None => f.write_str("PageAuth::None"),
			Self::Bearer(_) => f.write_str("PageAuth::Bearer(..)"),
			Self::Basic { username, .. } =>
				f.debug_struct("PageAuth::Basic").field("username", username).finish(),
		}
	}
}

/// [`PageSource`] over reqwest for URL-shaped cursors.
#[derive(Clone, Debug)]
pub struct ReqwestPageSource {
	client: ReqwestClient,
	auth: PageAuth,
}
impl ReqwestPageSource {
	/// Creates an unauthorized source over a default client.
	pub fn new() -> Self {
		Self::with_client(ReqwestClient::default())
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, auth: PageAuth::None }
	}

	/// Sets the authorization applied to every page request.
	pub fn with_auth(mut self, auth: PageAuth) -> Self {
		self.auth = auth;

		self
	}
}
impl Default for ReqwestPageSource {
	fn default() -> Self {
		Self::new()
	}
}
impl PageSource for ReqwestPageSource {
	fn fetch<'a>(&'a self, cursor: &Cursor) -> PageFuture<'a> {
		let target = cursor.as_str().to_owned();

		Box::pin(async move {
			let url = Url::parse(&target)?;
			let mut request = self.client.get(url);

			match &self.auth {
				PageAuth::None => {},
				PageAuth::Bearer(cache) => {
					let token = cache.valid_token().await?;

					request = request.bearer_auth(token.expose());
				},
				PageAuth::Basic { username, password } => {
					let raw = format!("{username}:{}", password.expose());

					request = request.header(AUTHORIZATION, format!("Basic {}", BASE64.encode(raw)));
				},
			}

			let response = request.send().await?;
			let status = response.status();

			if status == StatusCode::TOO_MANY_REQUESTS {
				return Ok(PageResponse::Throttled {
					retry_after: parse_retry_after(response.headers()),
				});
			}
			if !status.is_success() {
				return Err(UnexpectedStatus { status: status.as_u16() }.into());
			}

			let next = parse_link_next(response.headers());
			let body = response.bytes().await?.to_vec();

			Ok(PageResponse::Received { body, next })
		})
	}
}

/// [`CredentialExchange`] performing the password grant over reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestExchange {
	client: ReqwestClient,
	config: ExchangeConfig,
}
impl ReqwestExchange {
	/// Creates an exchange over a default client.
	pub fn new(config: ExchangeConfig) -> Self {
		Self::with_client(ReqwestClient::default(), config)
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient, config: ExchangeConfig) -> Self {
		Self { client, config }
	}
}
impl CredentialExchange for ReqwestExchange {
	fn exchange(&self) -> ExchangeFuture<'_> {
		Box::pin(async move {
			let form = ExchangeRequest::from_config(&self.config);
			let response = self
				.client
				.post(self.config.token_endpoint.clone())
				.form(&form)
				.send()
				.await
				.map_err(AuthenticationError::transport)?;
			let status = response.status();

			if status == StatusCode::TOO_MANY_REQUESTS {
				return Err(Error::RateLimited {
					retry_after: parse_retry_after(response.headers()),
				});
			}
			if !status.is_success() {
				let reason = response
					.text()
					.await
					.ok()
					.and_then(|body| extract_error_reason(&body))
					.unwrap_or_else(|| {
						status.canonical_reason().unwrap_or("unknown").to_string()
					});

				return Err(
					AuthenticationError::Rejected { status: status.as_u16(), reason }.into()
				);
			}

			let body = response.bytes().await.map_err(AuthenticationError::transport)?;
			let mut deserializer = serde_json::Deserializer::from_slice(&body);
			let parsed: ExchangeResponse = serde_path_to_error::deserialize(&mut deserializer)
				.map_err(|source| AuthenticationError::MalformedResponse { source })?;
			let credential = Credential::issue(
				parsed.access_token,
				parsed.refresh_token,
				parsed.expires_in,
				self.config.skew,
				OffsetDateTime::now_utc(),
			)?;

			Ok(credential)
		})
	}
}

/// Parses a `Retry-After` header given either in seconds or as an RFC 2822 date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

/// Extracts the `rel="next"` target from a `Link` header, if present.
pub fn parse_link_next(headers: &HeaderMap) -> Option<Cursor> {
	let value = headers.get(LINK)?.to_str().ok()?;

	for part in value.split(',') {
		let Some((target, params)) = part.split_once(';') else { continue };

		if !params.contains("rel=\"next\"") {
			continue;
		}

		let target = target.trim().trim_start_matches('<').trim_end_matches('>');

		return Some(Cursor::new(target));
	}

	None
}

fn extract_error_reason(body: &str) -> Option<String> {
	serde_json::from_str::<serde_json::Value>(body)
		.ok()?
		.get("error")?
		.as_str()
		.map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	fn headers_with(name: reqwest::header::HeaderName, value: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();

		headers.insert(name, HeaderValue::from_str(value).expect("Header fixture should parse."));

		headers
	}

	#[test]
	fn retry_after_parses_seconds() {
		let headers = headers_with(RETRY_AFTER, "2");

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(2)));
	}

	#[test]
	fn retry_after_parses_rfc2822_dates() {
		let future = OffsetDateTime::now_utc() + Duration::minutes(5);
		let formatted = future.format(&Rfc2822).expect("Formatting a date should succeed.");
		let headers = headers_with(RETRY_AFTER, &formatted);
		let parsed = parse_retry_after(&headers).expect("Future date should parse.");

		assert!(parsed > Duration::minutes(4));
		assert!(parsed <= Duration::minutes(5));
	}

	#[test]
	fn retry_after_ignores_garbage_and_past_dates() {
		assert_eq!(parse_retry_after(&HeaderMap::new()), None);
		assert_eq!(parse_retry_after(&headers_with(RETRY_AFTER, "soon")), None);

		let past = OffsetDateTime::now_utc() - Duration::minutes(5);
		let formatted = past.format(&Rfc2822).expect("Formatting a date should succeed.");

		assert_eq!(parse_retry_after(&headers_with(RETRY_AFTER, &formatted)), None);
	}

	#[test]
	fn link_header_yields_next_cursor() {
		let headers = headers_with(
			LINK,
			"<https://api.example/tickets?page=2>; rel=\"next\", <https://api.example/tickets?page=9>; rel=\"last\"",
		);

		assert_eq!(
			parse_link_next(&headers),
			Some(Cursor::new("https://api.example/tickets?page=2"))
		);
	}

	#[test]
	fn link_header_without_next_ends_pagination() {
		let headers =
			headers_with(LINK, "<https://api.example/tickets?page=1>; rel=\"prev\"");

		assert_eq!(parse_link_next(&headers), None);
	}

	#[test]
	fn error_reason_prefers_the_error_field() {
		assert_eq!(
			extract_error_reason(r#"{"error": "invalid_grant"}"#),
			Some("invalid_grant".into())
		);
		assert_eq!(extract_error_reason("not json"), None);
	}
}
