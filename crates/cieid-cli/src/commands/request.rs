use anyhow::{Context, Result};
use cieid_sdk::AuthenticationRequest;

use crate::cli::OutputFormat;
use crate::output::print_value;

pub fn parse_url(url: &str, format: OutputFormat) -> Result<()> {
    let request = AuthenticationRequest::parse(url).context("Invalid authentication URL")?;
    print_value(&serde_json::to_value(&request)?, format)
}
