use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Runtime settings for the message-orchestration agent.
///
/// Precedence: built-in defaults, then an optional `totem.toml` file, then
/// `TOTEM_*` environment variables. The backlog threshold, enrichment-loop
/// ceiling, and inter-message pacing gap are deliberately not configurable;
/// they live as constants next to the code they bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentConfig {
    /// Quiet gap required before a burst of messages flushes into one turn.
    pub debounce_delay_ms: u64,
    /// Target end-to-end latency for a reply. Zero disables pacing.
    pub response_delay_ms: u64,
    /// Inactivity window after which a session is reset on next contact.
    pub session_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { debounce_delay_ms: 3_000, response_delay_ms: 2_300, session_timeout_secs: 21_600 }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    agent: Option<FileAgentSection>,
}

#[derive(Debug, Default, Deserialize)]
struct FileAgentSection {
    debounce_delay_ms: Option<u64>,
    response_delay_ms: Option<u64>,
    session_timeout_secs: Option<u64>,
}

const ENV_DEBOUNCE_DELAY_MS: &str = "TOTEM_DEBOUNCE_DELAY_MS";
const ENV_RESPONSE_DELAY_MS: &str = "TOTEM_RESPONSE_DELAY_MS";
const ENV_SESSION_TIMEOUT_SECS: &str = "TOTEM_SESSION_TIMEOUT_SECS";

impl AgentConfig {
    /// Defaults, file, then process environment.
    pub fn load(options: &LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match &options.config_path {
            Some(path) => {
                if path.exists() {
                    config.merge_file(path)?;
                } else if options.require_file {
                    return Err(ConfigError::MissingConfigFile(path.clone()));
                }
            }
            None => {
                let default_path = Path::new("totem.toml");
                if default_path.exists() {
                    config.merge_file(default_path)?;
                }
            }
        }

        config.apply_env_overrides(env::vars())?;
        config.validate()?;
        Ok(config)
    }

    fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        let parsed: FileConfig = toml::from_str(&raw)
            .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })?;

        if let Some(agent) = parsed.agent {
            if let Some(value) = agent.debounce_delay_ms {
                self.debounce_delay_ms = value;
            }
            if let Some(value) = agent.response_delay_ms {
                self.response_delay_ms = value;
            }
            if let Some(value) = agent.session_timeout_secs {
                self.session_timeout_secs = value;
            }
        }
        Ok(())
    }

    /// Apply `TOTEM_*` overrides from an explicit variable iterator, so tests
    /// can feed variables without touching process state.
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                ENV_DEBOUNCE_DELAY_MS => self.debounce_delay_ms = parse_u64(&key, &value)?,
                ENV_RESPONSE_DELAY_MS => self.response_delay_ms = parse_u64(&key, &value)?,
                ENV_SESSION_TIMEOUT_SECS => self.session_timeout_secs = parse_u64(&key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "debounce_delay_ms must be greater than zero".to_owned(),
            ));
        }
        if self.session_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "session_timeout_secs must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}
