use std::sync::Arc;

use anyhow::{Context, Result};
use cieid_sdk::{CieIdSession, OrchestrationResult, SdkConfig};
use colored::Colorize;

use crate::card::{FileCard, FileReader};
use crate::cli::AuthenticateArgs;
use crate::output::ConsoleSink;

/// Runs one presentation of the card image. Returns `true` on success.
pub async fn authenticate(config: &SdkConfig, args: &AuthenticateArgs) -> Result<bool> {
    let mut card = FileCard::load(&args.certificate, args.card_pin.clone(), args.attempts)?;
    let reader = Arc::new(FileReader::new(Some(args.certificate.clone())));

    let session = CieIdSession::from_config(config, reader)?;
    session.start(Arc::new(ConsoleSink));
    session
        .set_request_url(&args.url)
        .context("Invalid authentication URL")?;
    session.set_pin(args.pin.as_str());
    session
        .start_listening()
        .context("Cannot enable tag discovery")?;

    println!(
        "{}: {}",
        "Identity provider".cyan(),
        config.idp.endpoint
    );

    let outcome = session.on_tag_discovered(&mut card).outcome().await;
    session.flush_notifications().await;
    session.stop_listening()?;

    match outcome {
        Some(OrchestrationResult::Success(_)) => Ok(true),
        Some(_) => Ok(false),
        None => anyhow::bail!("Card presentation was ignored"),
    }
}
