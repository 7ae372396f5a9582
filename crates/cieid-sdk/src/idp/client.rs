//! Identity provider client.
//!
//! [`IdentityProviderClient`] is the seam the orchestrator talks to.
//! [`HttpIdentityProviderClient`] is the default implementation: it posts the
//! request parameters as a form and forwards the card certificate in a header
//! for the TLS-terminating front end.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use url::Url;

use super::error::ExchangeError;
use crate::card::CardCertificate;
use crate::config::{ConfigError, IdpConfig};
use crate::deeplink::AuthenticationRequest;

/// Body returned by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdpResponse {
    /// `None` when the provider returned no content.
    pub body: Option<String>,
}

impl IdpResponse {
    /// Wraps a response body. An empty body is treated as absent.
    pub fn new(body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            body: (!body.is_empty()).then_some(body),
        }
    }

    /// A response without content.
    pub fn empty() -> Self {
        Self { body: None }
    }

    /// Returns the one-time code, the second colon-delimited field of the body.
    ///
    /// Returns `None` when there is no body and an empty string when the body
    /// has no second field.
    pub fn one_time_code(&self) -> Option<&str> {
        self.body
            .as_deref()
            .map(|body| body.split(':').nth(1).unwrap_or_default())
    }
}

/// Exchanges the card certificate for a one-time code.
#[async_trait]
pub trait IdentityProviderClient: Send + Sync {
    /// Sends the certificate and request parameters to the identity provider.
    async fn exchange(
        &self,
        certificate: &CardCertificate,
        request: &AuthenticationRequest,
    ) -> Result<IdpResponse, ExchangeError>;
}

/// HTTP implementation of [`IdentityProviderClient`].
pub struct HttpIdentityProviderClient {
    http_client: reqwest::Client,
    endpoint: Url,
    certificate_header: String,
}

impl HttpIdentityProviderClient {
    /// Creates a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &IdpConfig) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint_url()?;

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
            certificate_header: config.certificate_header.clone(),
        })
    }

    /// Creates a client for the production endpoint.
    pub fn with_defaults() -> Result<Self, ConfigError> {
        Self::new(&IdpConfig::default())
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl IdentityProviderClient for HttpIdentityProviderClient {
    async fn exchange(
        &self,
        certificate: &CardCertificate,
        request: &AuthenticationRequest,
    ) -> Result<IdpResponse, ExchangeError> {
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .header(
                self.certificate_header.as_str(),
                STANDARD.encode(certificate.as_bytes()),
            )
            .form(&request.exchange_params())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(endpoint = %self.endpoint, error = %e, "IdP request failed");
                ExchangeError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            // Unsuccessful responses carry no usable body
            tracing::warn!(endpoint = %self.endpoint, status = status.as_u16(), "IdP rejected the exchange");
            return Ok(IdpResponse::empty());
        }

        let body = response.text().await.map_err(ExchangeError::from)?;
        tracing::debug!(
            endpoint = %self.endpoint,
            body_len = body.len(),
            "IdP exchange completed"
        );

        Ok(IdpResponse::new(body))
    }
}
