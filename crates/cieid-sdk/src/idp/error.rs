//! Error types for the identity provider exchange.

/// Alert reported by OpenSSL-based stacks when the server certificate expired.
pub const CERTIFICATE_EXPIRED_ALERT: &str = "SSLV3_ALERT_CERTIFICATE_EXPIRED";

/// Alert reported by OpenSSL-based stacks when the server certificate was revoked.
pub const CERTIFICATE_REVOKED_ALERT: &str = "SSLV3_ALERT_CERTIFICATE_REVOKED";

// rustls renders `CertificateError::{Expired, Revoked}` this way
const RUSTLS_EXPIRED: &str = "invalid peer certificate: Expired";
const RUSTLS_REVOKED: &str = "invalid peer certificate: Revoked";

/// Errors that can occur while exchanging the certificate for a one-time code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The identity provider host could not be resolved or connected to.
    #[error("Host unreachable: {0}")]
    Unreachable(String),

    /// The TLS handshake with the identity provider failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Any other transport failure.
    #[error("Exchange failed: {0}")]
    Other(String),
}

/// Certificate problem reported by the identity provider's TLS stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsAlert {
    CertificateExpired,
    CertificateRevoked,
}

impl ExchangeError {
    /// Returns `true` if the failure means the network is not usable.
    #[must_use]
    pub fn is_connectivity_error(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unreachable(_))
    }

    /// Returns the certificate alert carried by a TLS failure, if any.
    #[must_use]
    pub fn tls_alert(&self) -> Option<TlsAlert> {
        let Self::Tls(message) = self else {
            return None;
        };

        if message.contains(CERTIFICATE_EXPIRED_ALERT) || message.contains(RUSTLS_EXPIRED) {
            Some(TlsAlert::CertificateExpired)
        } else if message.contains(CERTIFICATE_REVOKED_ALERT) || message.contains(RUSTLS_REVOKED)
        {
            Some(TlsAlert::CertificateRevoked)
        } else {
            None
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        let timeout = err.is_timeout();
        let connect = err.is_connect();
        // The endpoint path itself contains "SSL"
        let message = error_chain(&err.without_url());

        if timeout {
            return Self::Timeout(message);
        }
        if connect {
            if looks_like_tls(&message) {
                return Self::Tls(message);
            }
            return Self::Unreachable(message);
        }
        if looks_like_tls(&message) {
            return Self::Tls(message);
        }
        Self::Other(message)
    }
}

/// Joins an error and all of its sources into one message.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn looks_like_tls(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("ssl") || lower.contains("tls") || lower.contains("certificate")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExchangeError::Timeout("operation timed out".to_string());
        assert_eq!(err.to_string(), "Request timed out: operation timed out");

        let err = ExchangeError::Unreachable("dns error".to_string());
        assert_eq!(err.to_string(), "Host unreachable: dns error");
    }

    #[test]
    fn test_connectivity_predicate() {
        assert!(ExchangeError::Timeout("x".to_string()).is_connectivity_error());
        assert!(ExchangeError::Unreachable("x".to_string()).is_connectivity_error());
        assert!(!ExchangeError::Tls("x".to_string()).is_connectivity_error());
        assert!(!ExchangeError::Other("x".to_string()).is_connectivity_error());
    }

    #[test]
    fn test_tls_alert_openssl() {
        let err = ExchangeError::Tls(
            "error:14094415:SSL routines:ssl3_read_bytes:SSLV3_ALERT_CERTIFICATE_EXPIRED"
                .to_string(),
        );
        assert_eq!(err.tls_alert(), Some(TlsAlert::CertificateExpired));

        let err = ExchangeError::Tls(
            "error:14094414:SSL routines:ssl3_read_bytes:SSLV3_ALERT_CERTIFICATE_REVOKED"
                .to_string(),
        );
        assert_eq!(err.tls_alert(), Some(TlsAlert::CertificateRevoked));
    }

    #[test]
    fn test_tls_alert_rustls() {
        let err = ExchangeError::Tls(
            "error sending request: client error (Connect): invalid peer certificate: Expired"
                .to_string(),
        );
        assert_eq!(err.tls_alert(), Some(TlsAlert::CertificateExpired));
    }

    #[test]
    fn test_tls_alert_only_for_tls_errors() {
        let err = ExchangeError::Other(CERTIFICATE_EXPIRED_ALERT.to_string());
        assert_eq!(err.tls_alert(), None);

        let err = ExchangeError::Tls("handshake failure".to_string());
        assert_eq!(err.tls_alert(), None);
    }

    #[test]
    fn test_looks_like_tls() {
        assert!(looks_like_tls("SSL routines"));
        assert!(looks_like_tls("invalid peer certificate"));
        assert!(!looks_like_tls("connection refused"));
    }
}
