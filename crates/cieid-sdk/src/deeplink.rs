//! Parsing of the authentication-request deep link.
//!
//! The service provider page hands the app a URL whose query carries the
//! pending request. `value` and `name` identify the request at the identity
//! provider and are mandatory; every other parameter is optional.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

/// Query key carrying the request value.
pub const KEY_VALUE: &str = "value";
/// Query key carrying the request parameter name.
pub const KEY_NAME: &str = "name";
/// Query key carrying the SAML authn request.
pub const KEY_AUTHN_REQUEST: &str = "authnRequestString";
/// Query key carrying the URL to open after authentication.
pub const KEY_NEXT_URL: &str = "nextUrl";
/// Query key carrying the operator text shown to the user.
pub const KEY_OPERATOR_TEXT: &str = "OpText";
/// Query key carrying the service provider logo.
pub const KEY_LOGO: &str = "imgUrl";

/// Form field asking the identity provider to issue a one-time code.
pub const PARAM_GENERATE_CODE: &str = "generaCodice";

/// Errors that can occur while parsing a deep link.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeepLinkError {
    /// The URL could not be parsed.
    #[error("Invalid authentication URL: {0}")]
    InvalidUrl(String),

    /// A mandatory query parameter is absent or empty.
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
}

/// A pending authentication request, parsed from a deep link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationRequest {
    pub value: String,
    pub name: String,
    pub authn_request: String,
    pub next_url: String,
    pub operator_text: String,
    pub host: String,
    pub logo_url: String,
}

impl AuthenticationRequest {
    /// Parses an authentication request from a deep-link URL.
    ///
    /// # Errors
    ///
    /// Returns [`DeepLinkError::InvalidUrl`] if the URL is malformed and
    /// [`DeepLinkError::MissingParameter`] if `value` or `name` is absent.
    pub fn parse(url: &str) -> Result<Self, DeepLinkError> {
        let url = Url::parse(url).map_err(|e| DeepLinkError::InvalidUrl(e.to_string()))?;

        // First occurrence wins on duplicated keys
        let mut query: HashMap<String, String> = HashMap::new();
        for (key, value) in url.query_pairs() {
            query.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }

        let mut take = |key: &str| query.remove(key).unwrap_or_default();

        let request = Self {
            value: take(KEY_VALUE),
            name: take(KEY_NAME),
            authn_request: take(KEY_AUTHN_REQUEST),
            next_url: take(KEY_NEXT_URL),
            operator_text: take(KEY_OPERATOR_TEXT),
            logo_url: take(KEY_LOGO),
            host: url.host_str().unwrap_or_default().to_string(),
        };

        if request.value.is_empty() {
            return Err(DeepLinkError::MissingParameter(KEY_VALUE));
        }
        if request.name.is_empty() {
            return Err(DeepLinkError::MissingParameter(KEY_NAME));
        }

        Ok(request)
    }

    /// Form parameters posted to the identity provider.
    pub fn exchange_params(&self) -> Vec<(String, String)> {
        vec![
            (self.name.clone(), self.value.clone()),
            (KEY_AUTHN_REQUEST.to_string(), self.authn_request.clone()),
            (PARAM_GENERATE_CODE.to_string(), "1".to_string()),
        ]
    }

    /// Builds the authenticated URL handed back to the host.
    ///
    /// The parts are concatenated verbatim; the identity provider already
    /// URL-encodes `name` and `value` in the deep link.
    pub fn success_url(&self, code: &str) -> String {
        format!(
            "{}?{}={}&login=1&codice={}",
            self.next_url, self.name, self.value, code
        )
    }
}

impl std::str::FromStr for AuthenticationRequest {
    type Err = DeepLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "https://idserver.servizicie.interno.gov.it/OpenApp?\
        value=abc123&name=SAMLRequest&authnRequestString=req%3D1\
        &nextUrl=https%3A%2F%2Fsp.example.it%2Fnext&OpText=Comune%20di%20Roma\
        &imgUrl=https%3A%2F%2Fsp.example.it%2Flogo.png";

    #[test]
    fn test_parse_full() {
        let request = AuthenticationRequest::parse(FULL).unwrap();
        assert_eq!(request.value, "abc123");
        assert_eq!(request.name, "SAMLRequest");
        assert_eq!(request.authn_request, "req=1");
        assert_eq!(request.next_url, "https://sp.example.it/next");
        assert_eq!(request.operator_text, "Comune di Roma");
        assert_eq!(request.logo_url, "https://sp.example.it/logo.png");
        assert_eq!(request.host, "idserver.servizicie.interno.gov.it");
    }

    #[test]
    fn test_optional_fields_default_to_empty() {
        let request =
            AuthenticationRequest::parse("https://idp.example.it/app?value=v&name=n").unwrap();
        assert_eq!(request.value, "v");
        assert_eq!(request.name, "n");
        assert!(request.authn_request.is_empty());
        assert!(request.next_url.is_empty());
        assert!(request.operator_text.is_empty());
        assert!(request.logo_url.is_empty());
    }

    #[test]
    fn test_missing_value_or_name() {
        assert_eq!(
            AuthenticationRequest::parse("https://idp.example.it/app?name=n"),
            Err(DeepLinkError::MissingParameter(KEY_VALUE))
        );
        assert_eq!(
            AuthenticationRequest::parse("https://idp.example.it/app?value=v&name="),
            Err(DeepLinkError::MissingParameter(KEY_NAME))
        );
    }

    #[test]
    fn test_malformed_url() {
        let err = AuthenticationRequest::parse("not a url").unwrap_err();
        assert!(matches!(err, DeepLinkError::InvalidUrl(_)));
        assert!(err.to_string().starts_with("Invalid authentication URL"));
    }

    #[test]
    fn test_custom_scheme_without_host() {
        let request = AuthenticationRequest::parse("cieid:open?value=v&name=n").unwrap();
        assert!(request.host.is_empty());
    }

    #[test]
    fn test_exchange_params() {
        let request = AuthenticationRequest::parse(FULL).unwrap();
        let params = request.exchange_params();
        assert_eq!(
            params,
            vec![
                ("SAMLRequest".to_string(), "abc123".to_string()),
                ("authnRequestString".to_string(), "req=1".to_string()),
                ("generaCodice".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_success_url() {
        let request = AuthenticationRequest::parse(FULL).unwrap();
        assert_eq!(
            request.success_url("1234567890123456"),
            "https://sp.example.it/next?SAMLRequest=abc123&login=1&codice=1234567890123456"
        );
    }
}
