use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable that overrides the endpoint from the settings file
pub const ENDPOINT_ENV_VAR: &str = "PV_CHAT_ENDPOINT";

/// Settings loaded from ~/.config/pv-chat/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ChatSettings {
    /// Streaming chat endpoint
    pub endpoint: Option<String>,
    /// Treat a stream that produces nothing for this long as failed
    pub stall_timeout_secs: Option<u64>,
}

impl ChatSettings {
    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

static SETTINGS: OnceLock<ChatSettings> = OnceLock::new();

/// Get the loaded settings, initializing them lazily on first use.
pub fn get_settings() -> &'static ChatSettings {
    SETTINGS.get_or_init(|| {
        let loaded = settings_path().and_then(|path| load_settings_from(&path));
        match loaded {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!("Failed to load settings: {err:#}");
                ChatSettings::default()
            }
        }
    })
}

pub fn settings_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("pv-chat").join("settings.json"))
}

/// Read settings from `path`; a missing file yields defaults
pub fn load_settings_from(path: &Path) -> Result<ChatSettings> {
    if !path.exists() {
        return Ok(ChatSettings::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;

    let mut settings: ChatSettings = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse settings from {}", path.display()))?;

    // Allow ${VAR} references so the endpoint can live in the environment
    if let Some(endpoint) = &mut settings.endpoint {
        *endpoint = substitute_env_vars(endpoint).with_context(|| {
            format!("Failed to substitute env vars in {}", path.display())
        })?;
    }

    Ok(settings)
}

/// Pick the endpoint: CLI flag, then environment, then settings file, then the default
pub fn resolve_endpoint(cli_endpoint: Option<&str>, settings: &ChatSettings) -> String {
    if let Some(endpoint) = cli_endpoint {
        return endpoint.to_string();
    }
    if let Ok(endpoint) = std::env::var(ENDPOINT_ENV_VAR) {
        if !endpoint.trim().is_empty() {
            return endpoint;
        }
    }
    settings
        .endpoint
        .clone()
        .unwrap_or_else(llm::ChatClient::default_endpoint)
}

/// Replace `${VAR}` references; an unset variable or unclosed reference is an error
fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    // Inserted values are copied verbatim and never scanned again
    while let Some(start) = rest.find("${") {
        let len = rest[start..].find('}').ok_or_else(|| {
            anyhow::anyhow!("Unclosed environment variable substitution: {input}")
        })?;
        let var_name = &rest[start + 2..start + len];
        let var_value = std::env::var(var_name)
            .with_context(|| format!("Environment variable not set: {var_name}"))?;

        result.push_str(&rest[..start]);
        result.push_str(&var_value);
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);

    Ok(result)
}
