use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = ".bitbucket-rca.toml";

/// Environment variable overriding the store location.
pub const STORE_PATH_ENV: &str = "BITBUCKET_RCA_STORE";

pub const DEFAULT_BITBUCKET_API_BASE: &str = "https://api.bitbucket.org/2.0";

pub const DEFAULT_GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-3-flash-preview:generateContent";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Top-level configuration loaded from .bitbucket-rca.toml.
/// All fields are optional — the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bitbucket: BitbucketConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitbucketConfig {
    /// Base of the Bitbucket Cloud REST API
    #[serde(default = "default_bitbucket_api_base")]
    pub api_base: String,
}

impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            api_base: default_bitbucket_api_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// Full `generateContent` URL, without the key query parameter
    #[serde(default = "default_gemini_endpoint")]
    pub endpoint: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_gemini_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout. Requests never time out when unset.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Location of the JSON key-value store
    pub path: Option<PathBuf>,
}

fn default_bitbucket_api_base() -> String {
    DEFAULT_BITBUCKET_API_BASE.to_string()
}

fn default_gemini_endpoint() -> String {
    DEFAULT_GEMINI_ENDPOINT.to_string()
}

impl Config {
    /// Load configuration from `path`, or from .bitbucket-rca.toml in the
    /// current directory. Returns default config if the latter doesn't exist;
    /// an explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(default_path)?
                } else {
                    Config::default()
                }
            }
        };

        if config.storage.path.is_none() {
            if let Ok(store_path) = std::env::var(STORE_PATH_ENV) {
                config.storage.path = Some(PathBuf::from(store_path));
            }
        }

        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the store location: configured path, then the user config
    /// directory, then a file in the current directory.
    pub fn store_path(&self) -> PathBuf {
        self.storage.path.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|dir| dir.join("bitbucket-rca").join("store.json"))
                .unwrap_or_else(|| PathBuf::from(".bitbucket-rca-store.json"))
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.http.timeout_secs.map(Duration::from_secs)
    }

    /// HTTP client shared by the Bitbucket and Gemini clients.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}
