use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cieid_sdk::{CieIdSession, SdkConfig};
use serde_json::json;

use crate::card::FileReader;
use crate::cli::OutputFormat;
use crate::output::print_value;

pub fn probe(config: &SdkConfig, certificate: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let session = CieIdSession::from_config(config, Arc::new(FileReader::new(certificate)))?;

    print_value(
        &json!({
            "reader": "file",
            "hasFeature": session.has_transport_feature(),
            "enabled": session.is_transport_enabled(),
            "transceiveTimeoutMs": transceive_timeout_ms(session.card_config().transceive_timeout),
        }),
        format,
    )
}

fn transceive_timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_millis_saturate() {
        assert_eq!(transceive_timeout_ms(Duration::from_secs(5)), 5000);
        assert_eq!(transceive_timeout_ms(Duration::MAX), u64::MAX);
    }
}
