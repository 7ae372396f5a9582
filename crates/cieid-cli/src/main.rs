mod card;
mod cli;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            print_error(&format!("{e:#}"));
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<bool> {
    let cli = Cli::parse();
    let profile = &cli.profile;
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::ParseUrl(args) => {
            commands::request::parse_url(&args.url, format)?;
        }
        Commands::Authenticate(args) => {
            let mut sdk_config = config::resolve_sdk_config(&cli.idp, profile)?;
            if cli.verbose {
                sdk_config.logging.enabled = true;
                sdk_config.logging.level = "debug".to_string();
            }
            return commands::authenticate::authenticate(&sdk_config, args).await;
        }
        Commands::Probe(args) => {
            let sdk_config = config::resolve_sdk_config(&cli.idp, profile)?;
            commands::probe::probe(&sdk_config, args.certificate.clone(), format)?;
        }
        Commands::Config(args) => match &args.command {
            cli::ConfigCommands::Show => {
                let cfg = config::load_profile(profile)?;
                let resolved = config::resolve_sdk_config(&cli.idp, profile)?;
                println!("{}: {}", "Profile".cyan(), profile);
                println!(
                    "{}: {}",
                    "IdP".cyan(),
                    cfg.idp.as_deref().unwrap_or("(not set)")
                );
                println!(
                    "{}: {}",
                    "Timeout".cyan(),
                    cfg.timeout
                        .map(|secs| format!("{secs}s"))
                        .unwrap_or_else(|| "(not set)".to_string())
                );
                println!(
                    "{}: {}",
                    "Allow HTTP".cyan(),
                    cfg.allow_http.unwrap_or(false)
                );
                println!("{}: {}", "Effective IdP".cyan(), resolved.idp.endpoint);
            }
            cli::ConfigCommands::Set(set_args) => {
                let mut cfg = config::load_profile(profile)?;
                cfg.set(&set_args.key, &set_args.value)?;
                config::save_profile(profile, &cfg)?;
                output::print_success(&format!("Set {} = {}", set_args.key, set_args.value));
            }
        },
    }

    Ok(true)
}
