use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::pipeline::PipelineOptions;

/// Settings that can be saved to a file. Every field is optional so a file,
/// the built-in defaults and the command line can be layered with [`Config::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Recognition backend: "shazam" or "acrcloud"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub songrec_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr_host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr_access_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr_access_secret: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_tagged: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_recognition: Option<bool>,

    /// Minimum spacing between two recognition requests in a batch (0 = none)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_interval_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_timeout_secs: Option<u64>,

    /// Capture device, e.g. "alsa:default" or "pwpipe:my.monitor"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_seconds: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_seconds: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_art: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_album_art: Option<String>,
}

/// Which recognition service a run talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Shazam,
    AcrCloud,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shazam" | "songrec" => Ok(Backend::Shazam),
            "acrcloud" | "acr" => Ok(Backend::AcrCloud),
            _ => Err(ConfigError::Invalid(format!("unknown backend '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcrCloudCredentials {
    pub host: String,
    pub access_key: String,
    pub access_secret: String,
}

/// Fully resolved settings, passed explicitly to every component.
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: Backend,
    pub songrec_path: String,
    pub acrcloud: Option<AcrCloudCredentials>,
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub pipeline: PipelineOptions,
    pub request_interval: Duration,
    pub http_timeout: Duration,
    pub source: String,
    pub record_seconds: u32,
    pub refresh: Duration,
    pub song_file: PathBuf,
    pub album_art: PathBuf,
    pub default_album_art: PathBuf,
}

impl Settings {
    /// HTTP agent shared by the ACRCloud client and cover downloads.
    pub fn http_agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new().timeout(self.http_timeout).build()
    }
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    /// Values used when neither the config file nor the command line set them.
    pub fn builtin_defaults() -> Self {
        Config {
            backend: Some("shazam".to_string()),
            songrec_path: Some("songrec".to_string()),
            acr_host: Some("identify-eu-west-1.acrcloud.com".to_string()),
            acr_access_key: None,
            acr_access_secret: None,
            extensions: Some(vec!["mp3".to_string()]),
            recursive: Some(false),
            rename: Some(false),
            skip_tagged: Some(false),
            force_recognition: Some(false),
            request_interval_ms: Some(0),
            http_timeout_secs: Some(20),
            source: Some("alsa:default".to_string()),
            record_seconds: Some(12),
            refresh_seconds: Some(5),
            song_file: Some("data.song".to_string()),
            album_art: Some("album-cover.png".to_string()),
            default_album_art: Some("album-cover-default.png".to_string()),
        }
    }

    /// Get the config file path (~/.state/songtag/config.toml)
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::NoHome)?;
        Ok(Path::new(&home).join(".state").join("songtag").join("config.toml"))
    }

    /// Load the user's config file; a missing file yields an empty config.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Merge this config with another, preferring values from other
    pub fn merge(&mut self, other: &Config) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field.clone();
                })*
            };
        }
        take!(
            backend,
            songrec_path,
            acr_host,
            acr_access_key,
            acr_access_secret,
            extensions,
            recursive,
            rename,
            skip_tagged,
            force_recognition,
            request_interval_ms,
            http_timeout_secs,
            source,
            record_seconds,
            refresh_seconds,
            song_file,
            album_art,
            default_album_art
        );
    }

    /// Resolve against the built-in defaults into [`Settings`].
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let mut c = Config::builtin_defaults();
        c.merge(self);

        let backend: Backend = c.backend.unwrap_or_default().parse()?;

        let acrcloud = match (c.acr_host, c.acr_access_key, c.acr_access_secret) {
            (Some(host), Some(access_key), Some(access_secret)) => Some(AcrCloudCredentials {
                host,
                access_key,
                access_secret,
            }),
            _ => None,
        };
        if backend == Backend::AcrCloud && acrcloud.is_none() {
            return Err(ConfigError::Invalid(
                "acrcloud backend needs acr_access_key and acr_access_secret".to_string(),
            ));
        }

        let extensions: Vec<String> = c
            .extensions
            .unwrap_or_default()
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if extensions.is_empty() {
            return Err(ConfigError::Invalid("no audio extensions configured".to_string()));
        }

        Ok(Settings {
            backend,
            songrec_path: c.songrec_path.unwrap_or_else(|| "songrec".to_string()),
            acrcloud,
            extensions,
            recursive: c.recursive.unwrap_or(false),
            pipeline: PipelineOptions {
                rename: c.rename.unwrap_or(false),
                skip_tagged: c.skip_tagged.unwrap_or(false),
                force_recognition: c.force_recognition.unwrap_or(false),
            },
            request_interval: Duration::from_millis(c.request_interval_ms.unwrap_or(0)),
            http_timeout: Duration::from_secs(c.http_timeout_secs.unwrap_or(20)),
            source: c.source.unwrap_or_else(|| "alsa:default".to_string()),
            record_seconds: c.record_seconds.unwrap_or(12).max(1),
            refresh: Duration::from_secs(c.refresh_seconds.unwrap_or(5).max(1)),
            song_file: PathBuf::from(c.song_file.unwrap_or_else(|| "data.song".to_string())),
            album_art: PathBuf::from(c.album_art.unwrap_or_else(|| "album-cover.png".to_string())),
            default_album_art: PathBuf::from(
                c.default_album_art
                    .unwrap_or_else(|| "album-cover-default.png".to_string()),
            ),
        })
    }

    /// Print the config in a human-readable format
    pub fn print(&self, title: &str) {
        println!("{}:", title);

        if let Some(backend) = &self.backend {
            println!("  Backend:            {}", backend);
        }
        if let Some(path) = &self.songrec_path {
            println!("  songrec binary:     {}", path);
        }
        if let Some(host) = &self.acr_host {
            println!("  ACRCloud host:      {}", host);
        }
        if self.acr_access_key.is_some() {
            println!("  ACRCloud key:       (set)");
        }
        if let Some(ext) = &self.extensions {
            println!("  Extensions:         {}", ext.join(", "));
        }
        if let Some(recursive) = self.recursive {
            println!("  Recursive:          {}", recursive);
        }
        if let Some(rename) = self.rename {
            println!("  Rename files:       {}", rename);
        }
        if let Some(skip) = self.skip_tagged {
            println!("  Skip tagged files:  {}", skip);
        }
        if let Some(force) = self.force_recognition {
            println!("  Force recognition:  {}", force);
        }
        if let Some(ms) = self.request_interval_ms {
            println!("  Request interval:   {} ms", ms);
        }
        if let Some(secs) = self.http_timeout_secs {
            println!("  HTTP timeout:       {} seconds", secs);
        }
        if let Some(source) = &self.source {
            println!("  Capture source:     {}", source);
        }
        if let Some(secs) = self.record_seconds {
            println!("  Record length:      {} seconds", secs);
        }
        if let Some(secs) = self.refresh_seconds {
            println!("  Display refresh:    {} seconds", secs);
        }
        if let Some(file) = &self.song_file {
            println!("  Song file:          {}", file);
        }
        if let Some(art) = &self.album_art {
            println!("  Album art:          {}", art);
        }
        if let Some(art) = &self.default_album_art {
            println!("  Default album art:  {}", art);
        }
    }
}
