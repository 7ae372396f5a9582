use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "cieid")]
#[command(about = "CIE ID CLI — authenticate with an Italian electronic identity card")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Identity provider endpoint (overrides config and CIEID_IDP_URL env var)
    #[arg(short, long, global = true, env = "CIEID_IDP_URL")]
    pub idp: Option<String>,

    /// Config profile name
    #[arg(short, long, global = true, env = "CIEID_PROFILE", default_value = "default")]
    pub profile: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Print SDK logs (RUST_LOG overrides the level)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse an authentication deep link
    ParseUrl(ParseUrlArgs),
    /// Run one authentication with a card image on disk
    Authenticate(AuthenticateArgs),
    /// Show contactless transport capabilities
    Probe(ProbeArgs),
    /// Manage CLI configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct ParseUrlArgs {
    /// Deep link received from the service provider
    pub url: String,
}

#[derive(clap::Args)]
pub struct AuthenticateArgs {
    /// Deep link received from the service provider
    #[arg(short, long)]
    pub url: String,
    /// PIN used to open the secure channel
    #[arg(long, env = "CIEID_PIN", hide_env_values = true)]
    pub pin: String,
    /// DER certificate standing in for the card
    #[arg(short, long)]
    pub certificate: PathBuf,
    /// PIN the simulated card accepts (any PIN when unset)
    #[arg(long, env = "CIEID_CARD_PIN", hide_env_values = true)]
    pub card_pin: Option<String>,
    /// PIN attempts left on the simulated card
    #[arg(long, default_value_t = 3)]
    pub attempts: u8,
}

#[derive(clap::Args)]
pub struct ProbeArgs {
    /// Card image; the transport counts as enabled when it exists
    #[arg(short, long)]
    pub certificate: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set(SetArgs),
}

#[derive(clap::Args)]
pub struct SetArgs {
    /// Config key (idp, timeout, allow_http)
    pub key: String,
    /// Config value
    pub value: String,
}
