//! SDK configuration.
//!
//! Holds the identity provider endpoint, the card transport timeout and the
//! logging switch. Every section falls back to its defaults, so an empty
//! document is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Production identity provider endpoint.
pub const DEFAULT_IDP_ENDPOINT: &str =
    "https://idserver.servizicie.interno.gov.it:8443/idp/Authn/SSL/Login2";

/// Header carrying the base64-encoded card certificate.
pub const DEFAULT_CERTIFICATE_HEADER: &str = "X-Client-Certificate";

/// Root SDK configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [idp]
/// endpoint = "https://idserver.servizicie.interno.gov.it:8443/idp/Authn/SSL/Login2"
/// request_timeout = "10s"
///
/// [card]
/// transceive_timeout = "5s"
///
/// [logging]
/// enabled = true
/// level = "debug"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Identity provider exchange.
    pub idp: IdpConfig,

    /// Card transport.
    pub card: CardConfig,

    /// Logging.
    pub logging: LoggingConfig,
}

/// Identity provider exchange configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdpConfig {
    /// Endpoint receiving the certificate and request parameters.
    pub endpoint: String,

    /// HTTP request timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Allow a plain HTTP endpoint. Test setups only.
    pub allow_http: bool,

    /// Header carrying the card certificate.
    pub certificate_header: String,
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_IDP_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(10),
            allow_http: false,
            certificate_header: DEFAULT_CERTIFICATE_HEADER.to_string(),
        }
    }
}

impl IdpConfig {
    /// Sets the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Allows a plain HTTP endpoint.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Parses and checks the endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the endpoint does not parse or
    /// uses a scheme other than HTTPS (HTTP when `allow_http` is set).
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::Missing("idp.endpoint".to_string()));
        }

        let url = Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::InvalidValue(format!("idp.endpoint '{}': {}", self.endpoint, e))
        })?;

        match url.scheme() {
            "https" => Ok(url),
            "http" if self.allow_http => Ok(url),
            other => Err(ConfigError::InvalidValue(format!(
                "idp.endpoint scheme '{}' is not allowed (only HTTPS)",
                other
            ))),
        }
    }
}

/// Card transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CardConfig {
    /// Timeout for a single command exchanged with the card.
    #[serde(with = "humantime_serde")]
    pub transceive_timeout: Duration,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            transceive_timeout: Duration::from_millis(5000),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Install a log subscriber. Off by default: the host usually owns logging.
    pub enabled: bool,

    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration file could not be read or parsed.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl SdkConfig {
    /// Parses a configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if the document is not valid TOML or does
    /// not match the schema.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Reads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The IdP endpoint is not a valid HTTPS URL
    /// - A timeout is zero
    /// - The certificate header is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.idp.endpoint_url()?;

        if self.idp.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "idp.request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.idp.certificate_header.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "idp.certificate_header cannot be empty".to_string(),
            ));
        }

        if self.card.transceive_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "card.transceive_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
