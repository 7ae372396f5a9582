use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cieid_sdk::SdkConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProfileConfig {
    pub idp: Option<String>,
    /// Exchange timeout in seconds.
    pub timeout: Option<u64>,
    pub allow_http: Option<bool>,
}

impl ProfileConfig {
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "idp" => self.idp = Some(value.to_string()),
            "timeout" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("timeout must be a number of seconds, got '{value}'"))?;
                if secs == 0 {
                    anyhow::bail!("timeout must be greater than 0");
                }
                self.timeout = Some(secs);
            }
            "allow_http" => {
                let allow: bool = value
                    .parse()
                    .with_context(|| format!("allow_http must be true or false, got '{value}'"))?;
                self.allow_http = Some(allow);
            }
            other => {
                anyhow::bail!("Unknown config key: {other}. Valid keys: idp, timeout, allow_http")
            }
        }
        Ok(())
    }
}

pub type ConfigFile = HashMap<String, ProfileConfig>;

fn config_dir() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .context("Cannot determine home directory")?
        .join(".cieid");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

fn load_all_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::new());
    }
    let content = fs::read_to_string(path)?;
    let cfg: ConfigFile =
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(cfg)
}

fn save_profile_to(path: &Path, profile: &str, config: &ProfileConfig) -> Result<()> {
    let mut all = load_all_from(path)?;
    all.insert(profile.to_string(), config.clone());
    let content = toml::to_string_pretty(&all)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn load_profile(profile: &str) -> Result<ProfileConfig> {
    let all = load_all_from(&config_path()?)?;
    Ok(all.get(profile).cloned().unwrap_or_default())
}

pub fn save_profile(profile: &str, config: &ProfileConfig) -> Result<()> {
    save_profile_to(&config_path()?, profile, config)
}

/// Builds the SDK configuration: `--idp` flag / env, then profile, then defaults.
pub fn resolve_sdk_config(cli_idp: &Option<String>, profile: &str) -> Result<SdkConfig> {
    Ok(apply_profile(cli_idp, &load_profile(profile)?))
}

fn apply_profile(cli_idp: &Option<String>, profile: &ProfileConfig) -> SdkConfig {
    let mut config = SdkConfig::default();
    // 1. --idp flag / CIEID_IDP_URL env, 2. profile
    if let Some(idp) = cli_idp.as_ref().or(profile.idp.as_ref()) {
        config.idp.endpoint = idp.clone();
    }
    if let Some(secs) = profile.timeout {
        config.idp.request_timeout = Duration::from_secs(secs);
    }
    if let Some(allow) = profile.allow_http {
        config.idp.allow_http = allow;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use cieid_sdk::config::DEFAULT_IDP_ENDPOINT;

    #[test]
    fn test_profile_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(load_all_from(&path).unwrap().is_empty());

        let mut work = ProfileConfig::default();
        work.set("idp", "https://idp.test.it/login").unwrap();
        work.set("timeout", "4").unwrap();
        save_profile_to(&path, "work", &work).unwrap();
        save_profile_to(&path, "default", &ProfileConfig::default()).unwrap();

        let all = load_all_from(&path).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["work"], work);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut cfg = ProfileConfig::default();
        assert!(cfg.set("timeout", "soon").is_err());
        assert!(cfg.set("timeout", "0").is_err());
        assert!(cfg.set("allow_http", "maybe").is_err());
        assert!(cfg.set("format", "json").is_err());
        assert_eq!(cfg, ProfileConfig::default());
    }

    #[test]
    fn test_flag_wins_over_profile() {
        let profile = ProfileConfig {
            idp: Some("https://profile.test.it/login".to_string()),
            timeout: Some(7),
            allow_http: None,
        };

        let config = apply_profile(&Some("https://flag.test.it/login".to_string()), &profile);
        assert_eq!(config.idp.endpoint, "https://flag.test.it/login");
        assert_eq!(config.idp.request_timeout, Duration::from_secs(7));

        let config = apply_profile(&None, &profile);
        assert_eq!(config.idp.endpoint, "https://profile.test.it/login");

        let config = apply_profile(&None, &ProfileConfig::default());
        assert_eq!(config.idp.endpoint, DEFAULT_IDP_ENDPOINT);
        assert!(!config.idp.allow_http);
    }
}
