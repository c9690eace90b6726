use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::api::{google, nominatim};
use crate::rate_limit::RateLimiter;

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
pub const DEFAULT_INPUT: &str = "example_locations.csv";

/// Fatal setup problems, raised before any request is sent
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Set the {var} environment variable before running with the Google backend")]
    MissingApiKey { var: &'static str },

    #[error("Input must have a '{column}' column (found: {})", .found.join(", "))]
    MissingColumn {
        column: &'static str,
        found: Vec<String>,
    },

    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Delimiter must be a single ASCII character, got {0:?}")]
    Delimiter(String),
}

/// Google API credential. Never printed in full.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: Option<String>) -> Result<Self, ConfigError> {
        match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => Ok(Self(v)),
            _ => Err(ConfigError::MissingApiKey { var: API_KEY_VAR }),
        }
    }

    /// Read the key from `GOOGLE_API_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(std::env::var(API_KEY_VAR).ok())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Google Maps Geocoding API (needs GOOGLE_API_KEY)
    Google,
    /// OpenStreetMap Nominatim
    #[default]
    Nominatim,
}

impl Backend {
    pub fn default_output(self) -> PathBuf {
        match self {
            Backend::Google => PathBuf::from("geocoded_google_output.csv"),
            Backend::Nominatim => PathBuf::from("geocoded_output.csv"),
        }
    }

    pub fn default_delay(self) -> Duration {
        match self {
            Backend::Google => Duration::from_millis(200),
            Backend::Nominatim => nominatim::MIN_INTERVAL,
        }
    }
}

fn default_timeout_secs() -> u64 {
    google::DEFAULT_TIMEOUT.as_secs()
}

fn default_verbose() -> bool {
    false
}

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub backend: Option<Backend>,
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_verbose")]
    pub verbose: bool,
    #[serde(default)]
    pub google: Option<GoogleConfig>,
    #[serde(default)]
    pub nominatim: Option<NominatimConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GoogleConfig {
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NominatimConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl FileConfig {
    /// Load an explicitly named config file, which must exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Search the usual locations. Files that fail to load are skipped and
    /// returned alongside, so they can be reported once logging is up.
    pub fn load() -> (Option<Self>, Vec<ConfigError>) {
        Self::load_first(&get_config_paths())
    }

    fn load_first(paths: &[PathBuf]) -> (Option<Self>, Vec<ConfigError>) {
        let mut skipped = Vec::new();
        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_from(path) {
                Ok(config) => return (Some(config), skipped),
                Err(e) => skipped.push(e),
            }
        }
        (None, skipped)
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("placecode.toml"));
    paths.push(PathBuf::from(".placecode.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("placecode").join("config.toml"));
        paths.push(config_dir.join("placecode.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".placecode.toml"));
        paths.push(home.join(".config").join("placecode").join("config.toml"));
    }

    paths
}

/// Values given on the command line; `None` means "not given"
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub backend: Option<Backend>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub delimiter: Option<String>,
    pub delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub verbose: bool,
}

/// Fully resolved run settings: command line, then config file, then defaults
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: Backend,
    pub input: PathBuf,
    pub output: PathBuf,
    pub delimiter: u8,
    pub delay: Duration,
    pub timeout: Duration,
    pub user_agent: String,
    pub google_base_url: Option<String>,
    pub nominatim_base_url: Option<String>,
    pub verbose: bool,
}

impl Settings {
    pub fn resolve(cli: Overrides, file: Option<FileConfig>) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();
        let nominatim = file.nominatim.clone().unwrap_or_default();
        let google = file.google.clone().unwrap_or_default();

        let backend = cli.backend.or(file.backend).unwrap_or_default();
        let delimiter = parse_delimiter(cli.delimiter.or(file.delimiter).as_deref())?;
        let delay = cli
            .delay_ms
            .or(file.delay_ms)
            .map(Duration::from_millis)
            .unwrap_or_else(|| backend.default_delay());
        let timeout_secs = cli
            .timeout_secs
            .or(file.timeout_secs)
            .unwrap_or_else(default_timeout_secs);

        Ok(Self {
            backend,
            input: cli
                .input
                .or(file.input)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT)),
            output: cli
                .output
                .or(file.output)
                .unwrap_or_else(|| backend.default_output()),
            delimiter,
            delay,
            timeout: Duration::from_secs(timeout_secs),
            user_agent: cli
                .user_agent
                .or(nominatim.user_agent)
                .unwrap_or_else(|| nominatim::DEFAULT_USER_AGENT.to_string()),
            google_base_url: google.base_url,
            nominatim_base_url: nominatim.base_url,
            verbose: cli.verbose || file.verbose,
        })
    }
}

impl Settings {
    /// Pacing for the chosen backend; Nominatim never goes below its usage policy
    pub fn rate_limiter(&self) -> RateLimiter {
        let limiter = RateLimiter::new(self.delay);
        match self.backend {
            Backend::Google => limiter,
            Backend::Nominatim => limiter.with_floor(nominatim::MIN_INTERVAL),
        }
    }
}

fn parse_delimiter(value: Option<&str>) -> Result<u8, ConfigError> {
    match value {
        None => Ok(b','),
        Some("\\t" | "tab") => Ok(b'\t'),
        Some(s) if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        Some(s) => Err(ConfigError::Delimiter(s.to_string())),
    }
}
