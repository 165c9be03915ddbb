//! Runtime configuration.
//!
//! Endpoints, model names and the output directory are carried in explicit
//! structs built once at startup (from `.env` and the process environment) and
//! passed down to whoever needs them.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_LOCAL_MODEL: &str = "qwen2.5-coder:0.5b";
pub const DEFAULT_CLOUD_ENDPOINT: &str = "https://ollama.com/api/chat";
pub const DEFAULT_CLOUD_MODEL: &str = "gpt-oss:120b";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Which text-generation service to call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiMode {
    /// Ollama running on this machine.
    Local,
    /// Hosted Ollama, needs `OLLAMA_API_KEY`.
    #[default]
    Cloud,
}

impl FromStr for AiMode {
    type Err = ConfigError;

    /// Case-insensitive; an empty string is the default mode.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" => Ok(Self::default()),
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for AiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Cloud => write!(f, "cloud"),
        }
    }
}

/// Settings for the AI client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiConfig {
    pub mode: AiMode,
    pub local_endpoint: String,
    pub local_model: String,
    pub cloud_endpoint: String,
    pub cloud_model: String,
    pub api_key: Option<String>,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            mode: AiMode::default(),
            local_endpoint: DEFAULT_LOCAL_ENDPOINT.to_string(),
            local_model: DEFAULT_LOCAL_MODEL.to_string(),
            cloud_endpoint: DEFAULT_CLOUD_ENDPOINT.to_string(),
            cloud_model: DEFAULT_CLOUD_MODEL.to_string(),
            api_key: None,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AiConfig {
    /// Read from the process environment (does not load `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Build from an explicit variable map; unset keys keep their defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or(default)
        };

        Ok(Self {
            mode: vars
                .get("CSVMIGRATE_AI_MODE")
                .map(|v| v.parse::<AiMode>())
                .transpose()?
                .unwrap_or(defaults.mode),
            local_endpoint: text("CSVMIGRATE_LOCAL_ENDPOINT", defaults.local_endpoint),
            local_model: text("CSVMIGRATE_LOCAL_MODEL", defaults.local_model),
            cloud_endpoint: text("CSVMIGRATE_CLOUD_ENDPOINT", defaults.cloud_endpoint),
            cloud_model: text("CSVMIGRATE_CLOUD_MODEL", defaults.cloud_model),
            api_key: vars
                .get("OLLAMA_API_KEY")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            max_retries: parse_number(vars, "CSVMIGRATE_MAX_RETRIES", defaults.max_retries)?,
            timeout_secs: parse_number(vars, "CSVMIGRATE_TIMEOUT_SECS", defaults.timeout_secs)?,
        })
    }

    pub fn with_mode(mut self, mode: AiMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Endpoint for the current mode.
    pub fn endpoint(&self) -> &str {
        match self.mode {
            AiMode::Local => &self.local_endpoint,
            AiMode::Cloud => &self.cloud_endpoint,
        }
    }

    /// Model for the current mode.
    pub fn model(&self) -> &str {
        match self.mode {
            AiMode::Local => &self.local_model,
            AiMode::Cloud => &self.cloud_model,
        }
    }
}

fn parse_number<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub ai: AiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            ai: AiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `.env` (if any), then read the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(&env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let output_dir = vars
            .get("CSVMIGRATE_OUTPUT_DIR")
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_OUTPUT_DIR);

        Ok(Self {
            output_dir: PathBuf::from(output_dir),
            ai: AiConfig::from_vars(vars)?,
        })
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Where schema pairs are stored.
    pub fn schemas_dir(&self) -> PathBuf {
        self.output_dir.join("schemas")
    }
}
