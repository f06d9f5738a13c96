//! Credential exchange contract and configuration.
//!
//! The exchange is a password-grant request against a token endpoint:
//! `{grant_type, username, password, client_id, client_secret}` in, and
//! `{access_token, refresh_token?, expires_in}` out. The trait hides the
//! transport so the cache layer stays runtime-agnostic; the crate ships a
//! reqwest implementation behind the `reqwest` feature.

// self
use crate::{
	_prelude::*,
	auth::{credential::Credential, secret::Secret},
};

/// Boxed future returned by [`CredentialExchange::exchange`].
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<Credential>> + 'a + Send>>;

/// Contract for transports that can perform the authentication exchange.
pub trait CredentialExchange
where
	Self: Send + Sync,
{
	/// Performs one exchange attempt and returns a freshly issued [`Credential`].
	fn exchange(&self) -> ExchangeFuture<'_>;
}

/// Form payload submitted to the token endpoint.
#[derive(Debug, Serialize)]
pub struct ExchangeRequest<'a> {
	/// Fixed grant discriminator for the password exchange.
	pub grant_type: &'static str,
	/// Service account username.
	pub username: &'a str,
	/// Service account password.
	pub password: &'a str,
	/// OAuth client identifier.
	pub client_id: &'a str,
	/// OAuth client secret.
	pub client_secret: &'a str,
}
impl<'a> ExchangeRequest<'a> {
	/// Renders the form payload for the provided configuration.
	pub fn from_config(config: &'a ExchangeConfig) -> Self {
		Self {
			grant_type: "password",
			username: &config.username,
			password: config.password.expose(),
			client_id: &config.client_id,
			client_secret: config.client_secret.expose(),
		}
	}
}

/// Body returned by a successful token endpoint call.
#[derive(Debug, Deserialize)]
pub struct ExchangeResponse {
	/// Bearer token value.
	pub access_token: String,
	/// Optional refresh token value.
	pub refresh_token: Option<String>,
	/// Reported lifetime in seconds.
	pub expires_in: i64,
}

/// Errors raised while constructing or validating an [`ExchangeConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ExchangeConfigError {
	/// Username is required for the password grant.
	#[error("Missing username.")]
	MissingUsername,
	/// Password is required for the password grant.
	#[error("Missing password.")]
	MissingPassword,
	/// Client identifier is required for the password grant.
	#[error("Missing client identifier.")]
	MissingClientId,
	/// Client secret is required for the password grant.
	#[error("Missing client secret.")]
	MissingClientSecret,
	/// Token endpoint must be reachable over HTTP(S).
	#[error("The token endpoint must use HTTP(S): {url}.")]
	UnsupportedScheme {
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Validated configuration for the password-grant exchange.
#[derive(Clone, Debug)]
pub struct ExchangeConfig {
	/// Token endpoint the exchange posts to.
	pub token_endpoint: Url,
	/// Service account username.
	pub username: String,
	/// Service account password.
	pub password: Secret,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: Secret,
	/// Skew subtracted from the reported lifetime at issuance.
	pub skew: Duration,
}
impl ExchangeConfig {
	/// Returns a builder seeded with the token endpoint.
	pub fn builder(token_endpoint: Url) -> ExchangeConfigBuilder {
		ExchangeConfigBuilder::new(token_endpoint)
	}
}

/// Builder for [`ExchangeConfig`] values.
#[derive(Debug)]
pub struct ExchangeConfigBuilder {
	token_endpoint: Url,
	username: Option<String>,
	password: Option<Secret>,
	client_id: Option<String>,
	client_secret: Option<Secret>,
	skew: Duration,
}
impl ExchangeConfigBuilder {
	/// Creates a new builder seeded with the token endpoint.
	pub fn new(token_endpoint: Url) -> Self {
		Self {
			token_endpoint,
			username: None,
			password: None,
			client_id: None,
			client_secret: None,
			skew: crate::auth::DEFAULT_EXPIRY_SKEW,
		}
	}

	/// Sets the service account username.
	pub fn username(mut self, username: impl Into<String>) -> Self {
		self.username = Some(username.into());

		self
	}

	/// Sets the service account password.
	pub fn password(mut self, password: impl Into<String>) -> Self {
		self.password = Some(Secret::new(password));

		self
	}

	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the OAuth client secret.
	pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
		self.client_secret = Some(Secret::new(client_secret));

		self
	}

	/// Overrides the expiry skew (defaults to 30 seconds).
	pub fn skew(mut self, skew: Duration) -> Self {
		self.skew = if skew.is_negative() { Duration::ZERO } else { skew };

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ExchangeConfig, ExchangeConfigError> {
		if !matches!(self.token_endpoint.scheme(), "http" | "https") {
			return Err(ExchangeConfigError::UnsupportedScheme {
				url: self.token_endpoint.to_string(),
			});
		}

		Ok(ExchangeConfig {
			username: self.username.ok_or(ExchangeConfigError::MissingUsername)?,
			password: self.password.ok_or(ExchangeConfigError::MissingPassword)?,
			client_id: self.client_id.ok_or(ExchangeConfigError::MissingClientId)?,
			client_secret: self.client_secret.ok_or(ExchangeConfigError::MissingClientSecret)?,
			token_endpoint: self.token_endpoint,
			skew: self.skew,
		})
	}
}
