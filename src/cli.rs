//! Command-line pieces shared by the binaries.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Args;
use log::info;

use crate::config::{Config, Settings};
use crate::error::ConfigError;

/// Options every tool accepts; each one overrides the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Recognition backend: shazam or acrcloud
    #[arg(long)]
    pub backend: Option<String>,

    /// Path to the songrec binary
    #[arg(long)]
    pub songrec: Option<String>,

    /// ACRCloud host, e.g. identify-eu-west-1.acrcloud.com
    #[arg(long)]
    pub acr_host: Option<String>,

    #[arg(long)]
    pub acr_key: Option<String>,

    #[arg(long)]
    pub acr_secret: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Read settings from this file instead of ~/.state/songtag/config.toml
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Store the effective settings as the new defaults
    #[arg(long)]
    pub save_defaults: bool,

    /// Print the effective settings and exit
    #[arg(long)]
    pub show_config: bool,
}

impl CommonArgs {
    pub fn overrides(&self) -> Config {
        Config {
            backend: self.backend.clone(),
            songrec_path: self.songrec.clone(),
            acr_host: self.acr_host.clone(),
            acr_access_key: self.acr_key.clone(),
            acr_access_secret: self.acr_secret.clone(),
            http_timeout_secs: self.timeout,
            ..Config::new()
        }
    }
}

/// Layer the config file under `overrides`, then resolve.
///
/// Returns the merged `Config` as well, for `--show-config` and
/// `--save-defaults`.
pub fn load_settings(common: &CommonArgs, overrides: &Config) -> Result<(Config, Settings), ConfigError> {
    let mut config = match &common.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.merge(&common.overrides());
    config.merge(overrides);

    // Only settings that resolve are worth keeping as defaults
    let settings = config.resolve()?;

    if common.save_defaults {
        match &common.config {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
        info!("Saved settings as defaults");
    }

    Ok((config, settings))
}

/// Ask for a path on stdin. Surrounding whitespace and quotes are removed.
pub fn prompt_path(question: &str) -> io::Result<Option<PathBuf>> {
    print!("{} ", question);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(clean_path_input(&line))
}

fn clean_path_input(line: &str) -> Option<PathBuf> {
    let trimmed = line.trim().trim_matches(|c| c == '"' || c == '\'');
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path_input() {
        assert_eq!(clean_path_input("  /music/a.mp3\n"), Some(PathBuf::from("/music/a.mp3")));
        assert_eq!(clean_path_input("'/music/My Album'\n"), Some(PathBuf::from("/music/My Album")));
        assert_eq!(clean_path_input("\n"), None);
    }

    #[test]
    fn test_load_settings_layers_file_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config {
            backend: Some("acrcloud".to_string()),
            acr_access_key: Some("file-key".to_string()),
            acr_access_secret: Some("file-secret".to_string()),
            rename: Some(true),
            ..Config::new()
        }
        .save_to(&path)
        .unwrap();

        let common = CommonArgs {
            acr_key: Some("flag-key".to_string()),
            config: Some(path),
            ..CommonArgs::default()
        };
        let (_, settings) = load_settings(&common, &Config::new()).unwrap();
        let creds = settings.acrcloud.unwrap();
        assert_eq!(creds.access_key, "flag-key");
        assert_eq!(creds.access_secret, "file-secret");
        assert!(settings.pipeline.rename);

        let local = Config {
            rename: Some(false),
            ..Config::new()
        };
        let (_, settings) = load_settings(&common, &local).unwrap();
        assert!(!settings.pipeline.rename);
    }

    #[test]
    fn test_save_defaults_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let common = CommonArgs {
            backend: Some("shazam".to_string()),
            config: Some(path.clone()),
            save_defaults: true,
            ..CommonArgs::default()
        };
        load_settings(&common, &Config::new()).unwrap();
        let saved = Config::load_from(&path).unwrap();
        assert_eq!(saved.backend.as_deref(), Some("shazam"));
    }

    #[test]
    fn test_invalid_settings_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config {
            backend: Some("shazam".to_string()),
            ..Config::new()
        }
        .save_to(&path)
        .unwrap();

        let common = CommonArgs {
            backend: Some("napster".to_string()),
            config: Some(path.clone()),
            save_defaults: true,
            ..CommonArgs::default()
        };
        assert!(load_settings(&common, &Config::new()).is_err());
        let saved = Config::load_from(&path).unwrap();
        assert_eq!(saved.backend.as_deref(), Some("shazam"));
    }
}
