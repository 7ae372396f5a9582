//! Crate-level error type.
//!
//! Each collaborator has its own closed error enum. [`SdkError`] wraps them
//! for callers that drive several collaborators at once.

use std::fmt;

use crate::card::{CardError, TransportError};
use crate::config::ConfigError;
use crate::deeplink::DeepLinkError;
use crate::idp::ExchangeError;

/// Errors returned by the SDK.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// The card rejected or interrupted an operation.
    #[error(transparent)]
    Card(#[from] CardError),

    /// The identity provider exchange failed.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// The deep link could not be parsed.
    #[error(transparent)]
    DeepLink(#[from] DeepLinkError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The contactless transport is unavailable or failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session has no runtime to run on.
    #[error("No async runtime available: {message}")]
    Runtime {
        /// Description of the runtime error.
        message: String,
    },
}

impl SdkError {
    /// Creates a new `Runtime` error.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Returns `true` if the error came from the card or its transport.
    #[must_use]
    pub fn is_card_error(&self) -> bool {
        matches!(self, Self::Card(_) | Self::Transport(_))
    }

    /// Returns `true` if the error is a connectivity problem.
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Exchange(e) if e.is_connectivity_error())
    }

    /// Returns the error category for logging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Card(_) | Self::Transport(_) => ErrorCategory::Card,
            Self::Exchange(_) => ErrorCategory::Network,
            Self::DeepLink(_) => ErrorCategory::Request,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Runtime { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of SDK errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Card or contactless transport.
    Card,
    /// Identity provider connectivity.
    Network,
    /// Configuration errors.
    Configuration,
    /// Malformed authentication request.
    Request,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Card => write!(f, "card"),
            Self::Network => write!(f, "network"),
            Self::Configuration => write!(f, "configuration"),
            Self::Request => write!(f, "request"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Result alias for SDK operations.
pub type SdkResult<T> = Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_is_transparent() {
        let err = SdkError::from(CardError::TagLost);
        assert_eq!(err.to_string(), "Tag was lost");

        let err = SdkError::from(DeepLinkError::MissingParameter("value"));
        assert_eq!(err.to_string(), DeepLinkError::MissingParameter("value").to_string());

        let err = SdkError::runtime("not inside a tokio runtime");
        assert_eq!(
            err.to_string(),
            "No async runtime available: not inside a tokio runtime"
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            SdkError::from(CardError::PinLocked).category(),
            ErrorCategory::Card
        );
        assert_eq!(
            SdkError::from(TransportError::Disabled).category(),
            ErrorCategory::Card
        );
        assert_eq!(
            SdkError::from(ExchangeError::Timeout("t".to_string())).category(),
            ErrorCategory::Network
        );
        assert_eq!(
            SdkError::from(ConfigError::Missing("idp.endpoint".to_string())).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            SdkError::from(DeepLinkError::InvalidUrl("x".to_string())).category(),
            ErrorCategory::Request
        );
        assert_eq!(SdkError::runtime("x").category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_error_predicates() {
        assert!(SdkError::from(CardError::TagLost).is_card_error());
        assert!(SdkError::from(ExchangeError::Unreachable("dns".to_string())).is_network_error());
        assert!(!SdkError::from(ExchangeError::Other("x".to_string())).is_network_error());
        assert!(!SdkError::from(ConfigError::Load("x".to_string())).is_card_error());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Network.to_string(), "network");
        assert_eq!(ErrorCategory::Request.to_string(), "request");
    }
}
