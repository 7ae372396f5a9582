//! Card and reader backed by a certificate file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cieid_sdk::card::{
    CardCertificate, CardError, ContactlessReader, Pin, SecureChannelSession, TransportError,
};

/// Simulated card holding a DER certificate read from disk.
pub struct FileCard {
    certificate: Vec<u8>,
    expected_pin: Option<String>,
    attempts_remaining: u8,
    channel_open: bool,
}

impl FileCard {
    pub fn new(certificate: Vec<u8>, expected_pin: Option<String>, attempts: u8) -> Self {
        Self {
            certificate,
            expected_pin,
            attempts_remaining: attempts,
            channel_open: false,
        }
    }

    pub fn load(path: &Path, expected_pin: Option<String>, attempts: u8) -> Result<Self> {
        let certificate = fs::read(path)
            .with_context(|| format!("Cannot read certificate {}", path.display()))?;
        Ok(Self::new(certificate, expected_pin, attempts))
    }

    pub fn attempts_remaining(&self) -> u8 {
        self.attempts_remaining
    }
}

impl SecureChannelSession for FileCard {
    fn open_secure_channel(&mut self, pin: &Pin) -> Result<(), CardError> {
        // An empty image answers like a tag without the identity application
        if self.certificate.is_empty() {
            return Err(CardError::NotRecognizedCard);
        }
        if self.attempts_remaining == 0 {
            return Err(CardError::PinLocked);
        }

        match &self.expected_pin {
            Some(expected) if expected != pin.expose() => {
                self.attempts_remaining -= 1;
                Err(CardError::PinRejected {
                    attempts_remaining: self.attempts_remaining,
                })
            }
            _ => {
                self.channel_open = true;
                Ok(())
            }
        }
    }

    fn read_certificate(&mut self) -> Result<CardCertificate, CardError> {
        if !self.channel_open {
            return Err(CardError::other("secure channel not open"));
        }
        Ok(CardCertificate::new(self.certificate.clone()))
    }
}

/// Reader whose transport is enabled while a card image is present.
pub struct FileReader {
    image: Option<PathBuf>,
}

impl FileReader {
    pub fn new(image: Option<PathBuf>) -> Self {
        Self { image }
    }
}

impl ContactlessReader for FileReader {
    fn has_feature(&self) -> bool {
        true
    }

    fn is_enabled(&self) -> bool {
        self.image.as_deref().is_some_and(Path::exists)
    }

    fn enable_discovery(&self) -> Result<(), TransportError> {
        if !self.is_enabled() {
            return Err(TransportError::Disabled);
        }
        tracing::debug!(image = ?self.image, "File reader discovery enabled");
        Ok(())
    }

    fn disable_discovery(&self) -> Result<(), TransportError> {
        tracing::debug!("File reader discovery disabled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_pin_counts_down_to_lock() {
        let mut card = FileCard::new(vec![0x30], Some("12345678".to_string()), 2);
        let wrong = Pin::new("00000000");

        assert_eq!(
            card.open_secure_channel(&wrong),
            Err(CardError::PinRejected {
                attempts_remaining: 1
            })
        );
        assert_eq!(
            card.open_secure_channel(&wrong),
            Err(CardError::PinRejected {
                attempts_remaining: 0
            })
        );
        assert_eq!(
            card.open_secure_channel(&Pin::new("12345678")),
            Err(CardError::PinLocked)
        );
        assert_eq!(card.attempts_remaining(), 0);
    }

    #[test]
    fn test_right_pin_reads_certificate() {
        let mut card = FileCard::new(vec![0x30, 0x82], Some("12345678".to_string()), 3);
        assert!(card.read_certificate().is_err());

        card.open_secure_channel(&Pin::new("12345678")).unwrap();
        assert_eq!(card.read_certificate().unwrap().as_bytes(), &[0x30, 0x82]);
    }

    #[test]
    fn test_any_pin_without_expectation() {
        let mut card = FileCard::new(vec![0x30], None, 3);
        assert!(card.open_secure_channel(&Pin::new("1")).is_ok());
    }

    #[test]
    fn test_empty_image_is_not_a_cie() {
        let mut card = FileCard::new(Vec::new(), None, 3);
        assert_eq!(
            card.open_secure_channel(&Pin::new("1")),
            Err(CardError::NotRecognizedCard)
        );
    }

    #[test]
    fn test_reader_enabled_with_image() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let reader = FileReader::new(Some(file.path().to_path_buf()));
        assert!(reader.is_enabled());
        assert!(reader.enable_discovery().is_ok());

        let reader = FileReader::new(None);
        assert!(reader.has_feature());
        assert!(!reader.is_enabled());
        assert_eq!(reader.enable_discovery(), Err(TransportError::Disabled));
    }
}
