use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSettings {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Print each think/act/observe phase to stdout.
    #[serde(default = "default_narrate")]
    pub narrate: bool,
    /// Store decisions that name no registered tool as assistant turns.
    #[serde(default)]
    pub record_unrouted_decisions: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            narrate: default_narrate(),
            record_unrouted_decisions: false,
        }
    }
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant with access to tools.".into()
}

fn default_narrate() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `warn` or `sayr_loop=debug`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_filter() -> String {
    "warn".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|err| AgentError::Config(format!("Failed to parse configuration: {err}")))
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(prompt) = env::var("SAYR_SYSTEM_PROMPT") {
            self.agent.system_prompt = prompt;
        }
        if let Ok(narrate) = env::var("SAYR_NARRATE") {
            self.agent.narrate = parse_flag("SAYR_NARRATE", &narrate)?;
        }
        if let Ok(record) = env::var("SAYR_RECORD_UNROUTED") {
            self.agent.record_unrouted_decisions = parse_flag("SAYR_RECORD_UNROUTED", &record)?;
        }
        if let Ok(filter) = env::var("SAYR_LOG") {
            self.logging.filter = filter;
        }
        if let Ok(format) = env::var("SAYR_LOG_FORMAT") {
            self.logging.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(AgentError::Config(format!(
                        "SAYR_LOG_FORMAT must be `pretty` or `json`, got `{other}`"
                    )))
                }
            };
        }
        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AgentError::Config(format!(
            "{name} must be a boolean, got `{other}`"
        ))),
    }
}
