//! Stable vocabulary of lifecycle and failure signals.
//!
//! Every fault raised by the card transport, the secure channel or the
//! identity provider exchange is collapsed into one [`Event`] before it
//! reaches the host. The rendered names are part of the public contract:
//! bridge layers forward them as plain strings, so they never change.
//!
//! | Family | Event | Name |
//! |---|---|---|
//! | Tag | [`Event::TagDiscovered`] | `ON_TAG_DISCOVERED` |
//! | Tag | [`Event::NotRecognizedCard`] | `ON_TAG_DISCOVERED_NOT_CIE` |
//! | Tag | [`Event::TagLost`] | `ON_TAG_LOST` |
//! | Card | [`Event::PinError`] | `ON_PIN_ERROR` |
//! | Card | [`Event::CardLocked`] | `ON_CARD_PIN_LOCKED` |
//! | Certificate | [`Event::CertificateExpired`] | `CERTIFICATE_EXPIRED` |
//! | Certificate | [`Event::CertificateRevoked`] | `CERTIFICATE_REVOKED` |
//! | Error | [`Event::AuthenticationError`] | `AUTHENTICATION_ERROR` |
//! | Error | [`Event::GeneralError`] | `GENERAL_ERROR` |
//! | Error | [`Event::NoInternetConnection`] | `ON_NO_INTERNET_CONNECTION` |

use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Family an [`Event`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventFamily {
    /// Contactless tag lifecycle
    Tag,
    /// Card PIN state
    Card,
    /// Identity provider TLS certificate state
    Certificate,
    /// Exchange and validation failures
    Error,
}

impl EventFamily {
    /// Returns the string representation of the family.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventFamily::Tag => "tag",
            EventFamily::Card => "card",
            EventFamily::Certificate => "certificate",
            EventFamily::Error => "error",
        }
    }
}

impl std::fmt::Display for EventFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A lifecycle or failure signal delivered to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// A tag entered the field and a run started.
    TagDiscovered,
    /// The tag answered but is not an identity card.
    NotRecognizedCard,
    /// The contactless link dropped mid-session.
    TagLost,
    /// The card rejected the PIN; further attempts remain.
    PinError {
        /// Attempts left before the card locks.
        attempts_remaining: u8,
    },
    /// The PIN is blocked.
    CardLocked,
    /// The identity provider presented an expired TLS certificate.
    CertificateExpired,
    /// The identity provider presented a revoked TLS certificate.
    CertificateRevoked,
    /// The identity provider answered with an empty body.
    AuthenticationError,
    /// The identity provider answered with a malformed one-time code.
    GeneralError,
    /// The identity provider could not be reached.
    NoInternetConnection,
}

impl Event {
    /// Every event, in declaration order. `PinError` carries a zero counter.
    pub const ALL: [Event; 10] = [
        Event::TagDiscovered,
        Event::NotRecognizedCard,
        Event::TagLost,
        Event::PinError {
            attempts_remaining: 0,
        },
        Event::CardLocked,
        Event::CertificateExpired,
        Event::CertificateRevoked,
        Event::AuthenticationError,
        Event::GeneralError,
        Event::NoInternetConnection,
    ];

    /// Returns the stable name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::TagDiscovered => "ON_TAG_DISCOVERED",
            Event::NotRecognizedCard => "ON_TAG_DISCOVERED_NOT_CIE",
            Event::TagLost => "ON_TAG_LOST",
            Event::PinError { .. } => "ON_PIN_ERROR",
            Event::CardLocked => "ON_CARD_PIN_LOCKED",
            Event::CertificateExpired => "CERTIFICATE_EXPIRED",
            Event::CertificateRevoked => "CERTIFICATE_REVOKED",
            Event::AuthenticationError => "AUTHENTICATION_ERROR",
            Event::GeneralError => "GENERAL_ERROR",
            Event::NoInternetConnection => "ON_NO_INTERNET_CONNECTION",
        }
    }

    pub fn family(&self) -> EventFamily {
        match self {
            Event::TagDiscovered | Event::NotRecognizedCard | Event::TagLost => EventFamily::Tag,
            Event::PinError { .. } | Event::CardLocked => EventFamily::Card,
            Event::CertificateExpired | Event::CertificateRevoked => EventFamily::Certificate,
            Event::AuthenticationError | Event::GeneralError | Event::NoInternetConnection => {
                EventFamily::Error
            }
        }
    }

    /// Returns `true` if the event ends a run.
    ///
    /// Only [`Event::TagDiscovered`] is a progress notification.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::TagDiscovered)
    }

    /// Remaining PIN attempts, for [`Event::PinError`] only.
    pub fn attempts_remaining(&self) -> Option<u8> {
        match self {
            Event::PinError { attempts_remaining } => Some(*attempts_remaining),
            _ => None,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a string is not a known event name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown event name: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for Event {
    type Err = UnknownEvent;

    /// Parses a stable event name. `ON_PIN_ERROR` parses with a zero counter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Event::ALL
            .iter()
            .find(|event| event.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

/// Wire shape used by bridge layers.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRepr {
    event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attempts_remaining: Option<u8>,
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EventRepr {
            event: self.as_str().to_string(),
            attempts_remaining: self.attempts_remaining(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = EventRepr::deserialize(deserializer)?;
        let event: Event = repr.event.parse().map_err(D::Error::custom)?;
        Ok(match event {
            Event::PinError { .. } => Event::PinError {
                attempts_remaining: repr.attempts_remaining.unwrap_or_default(),
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_names() {
        assert_eq!(Event::TagDiscovered.to_string(), "ON_TAG_DISCOVERED");
        assert_eq!(
            Event::NotRecognizedCard.to_string(),
            "ON_TAG_DISCOVERED_NOT_CIE"
        );
        assert_eq!(
            Event::PinError {
                attempts_remaining: 2
            }
            .to_string(),
            "ON_PIN_ERROR"
        );
        assert_eq!(
            Event::NoInternetConnection.to_string(),
            "ON_NO_INTERNET_CONNECTION"
        );
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = Event::ALL.iter().map(Event::as_str).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Event::ALL.len());
    }

    #[test]
    fn test_parse_every_name() {
        for event in Event::ALL {
            assert_eq!(event.as_str().parse::<Event>().unwrap(), event);
        }
        assert!("ON_SOMETHING_ELSE".parse::<Event>().is_err());
    }

    #[test]
    fn test_families() {
        assert_eq!(Event::TagLost.family(), EventFamily::Tag);
        assert_eq!(Event::CardLocked.family(), EventFamily::Card);
        assert_eq!(Event::CertificateRevoked.family(), EventFamily::Certificate);
        assert_eq!(Event::GeneralError.family(), EventFamily::Error);
        assert_eq!(EventFamily::Certificate.to_string(), "certificate");
    }

    #[test]
    fn test_only_pin_error_carries_payload() {
        let pin = Event::PinError {
            attempts_remaining: 2,
        };
        assert_eq!(pin.attempts_remaining(), Some(2));
        assert!(
            Event::ALL
                .iter()
                .filter(|e| !matches!(e, Event::PinError { .. }))
                .all(|e| e.attempts_remaining().is_none())
        );
    }

    #[test]
    fn test_equality_includes_payload() {
        assert_ne!(
            Event::PinError {
                attempts_remaining: 1
            },
            Event::PinError {
                attempts_remaining: 2
            }
        );
    }

    #[test]
    fn test_terminal() {
        assert!(!Event::TagDiscovered.is_terminal());
        assert!(Event::TagLost.is_terminal());
        assert!(Event::AuthenticationError.is_terminal());
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(Event::PinError {
            attempts_remaining: 2,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "ON_PIN_ERROR", "attemptsRemaining": 2})
        );

        let json = serde_json::to_value(Event::CardLocked).unwrap();
        assert_eq!(json, serde_json::json!({"event": "ON_CARD_PIN_LOCKED"}));

        let back: Event =
            serde_json::from_str(r#"{"event":"ON_PIN_ERROR","attemptsRemaining":1}"#).unwrap();
        assert_eq!(
            back,
            Event::PinError {
                attempts_remaining: 1
            }
        );

        assert!(serde_json::from_str::<Event>(r#"{"event":"NOPE"}"#).is_err());
    }
}
