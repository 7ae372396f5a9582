//! Contracts towards the contactless card and the platform reader.
//!
//! The command set that talks to the card silicon lives outside this crate.
//! Implementations of [`SecureChannelSession`] wrap one presented tag and
//! report failures through the closed [`CardError`] type; implementations of
//! [`ContactlessReader`] wrap the platform adapter that turns discovery on and
//! off.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// PIN used to open the secure channel.
///
/// The digits never appear in `Debug` output and are wiped on drop.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Pin(String);

impl Pin {
    pub fn new(pin: impl Into<String>) -> Self {
        Self(pin.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(***)")
    }
}

impl From<&str> for Pin {
    fn from(pin: &str) -> Self {
        Self::new(pin)
    }
}

impl From<String> for Pin {
    fn from(pin: String) -> Self {
        Self::new(pin)
    }
}

/// Authentication certificate read off the card (DER bytes).
#[derive(Clone, PartialEq, Eq)]
pub struct CardCertificate(Vec<u8>);

impl CardCertificate {
    pub fn new(der: impl Into<Vec<u8>>) -> Self {
        Self(der.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CardCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardCertificate")
            .field("len", &self.0.len())
            .finish()
    }
}

/// Faults raised while talking to a presented card.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CardError {
    /// The tag answered but does not host the identity application.
    #[error("Tag is not a CIE")]
    NotRecognizedCard,

    /// The contactless link dropped mid-session.
    #[error("Tag was lost")]
    TagLost,

    /// The card rejected the PIN.
    #[error("Wrong PIN, {attempts_remaining} attempts remaining")]
    PinRejected {
        /// Attempts left before the card locks.
        attempts_remaining: u8,
    },

    /// The PIN is blocked.
    #[error("PIN is locked")]
    PinLocked,

    /// Any other card or transport failure.
    #[error("{0}")]
    Other(String),
}

impl CardError {
    /// Creates an `Other` error.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// One presented identity card.
///
/// Calls arrive strictly in order: [`open_secure_channel`] once, then
/// [`read_certificate`] once if the channel opened.
///
/// [`open_secure_channel`]: SecureChannelSession::open_secure_channel
/// [`read_certificate`]: SecureChannelSession::read_certificate
pub trait SecureChannelSession {
    /// Verifies the PIN and establishes the secure channel.
    fn open_secure_channel(&mut self, pin: &Pin) -> Result<(), CardError>;

    /// Reads the authentication certificate over the secure channel.
    fn read_certificate(&mut self) -> Result<CardCertificate, CardError>;
}

/// Errors raised by the platform reader.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The device has no contactless hardware.
    #[error("Contactless transport is not available on this device")]
    Unavailable,

    /// The hardware is present but switched off.
    #[error("Contactless transport is disabled")]
    Disabled,

    /// Platform-specific failure.
    #[error("Transport error: {0}")]
    Platform(String),
}

/// Platform adapter driving tag discovery.
pub trait ContactlessReader: Send + Sync {
    /// Returns `true` if the device has contactless hardware.
    fn has_feature(&self) -> bool;

    /// Returns `true` if the contactless hardware is switched on.
    fn is_enabled(&self) -> bool;

    /// Starts delivering presented tags to the session.
    fn enable_discovery(&self) -> Result<(), TransportError>;

    /// Stops delivering presented tags.
    fn disable_discovery(&self) -> Result<(), TransportError>;

    /// Opens the platform settings page for the contactless transport.
    fn open_settings(&self) -> Result<(), TransportError> {
        Err(TransportError::Platform(
            "settings page not supported".to_string(),
        ))
    }
}
