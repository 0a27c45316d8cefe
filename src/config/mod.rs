//! Configuration loading: TOML file plus environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::llm::LlmOptions;

const CONFIG_ENV_VAR: &str = "PAPERFETCH_CONFIG_FILE";
const LOCAL_CONFIG_FILE: &str = "paperfetch.toml";

/// Template values shipped in example configs, treated as unset
const PLACEHOLDERS: [&str; 3] = ["YOUR_LLM_API_KEY", "YOUR_S2_API_KEY", "you@example.com"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing LLM config in {source_path}: {fields}.")]
    MissingLlm { fields: String, source_path: String },

    #[error("llm.base_url must start with http/https.")]
    InvalidBaseUrl,

    #[error("LLM timeout must be > 0.")]
    InvalidTimeout,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    llm: LlmSection,
    #[serde(default)]
    providers: ProviderSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LlmSection {
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    disable_reasoning: bool,
    #[serde(default)]
    system_prompt: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProviderSection {
    #[serde(default)]
    s2_api_key: String,
    #[serde(default)]
    openalex_email: String,
}

/// Resolved application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_disable_reasoning: bool,
    pub llm_system_prompt: String,
    pub s2_api_key: String,
    pub openalex_email: String,
    /// Where the values came from, for error messages
    pub source_path: String,
}

impl AppConfig {
    /// Load configuration from the first file found, then apply
    /// `PAPERFETCH_*` environment overrides.
    ///
    /// Search order: `PAPERFETCH_CONFIG_FILE` (must exist when set),
    /// `./paperfetch.toml`, then `paperfetch/config.toml` under the user
    /// config directory. No file at all is fine; env vars may still
    /// supply everything.
    pub fn load() -> Result<Self, ConfigError> {
        let path = pick_config_path()?;
        let mut config = match &path {
            Some(path) => Self::from_file(path)?,
            None => Self {
                source_path: format!("{LOCAL_CONFIG_FILE} (not found)"),
                ..Self::default()
            },
        };
        config.apply_env();
        config.clear_placeholders();
        Ok(config)
    }

    /// Parse one TOML config file without environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: ConfigFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(Self {
            llm_base_url: parsed.llm.base_url.trim().to_string(),
            llm_api_key: parsed.llm.api_key.trim().to_string(),
            llm_model: parsed.llm.model.trim().to_string(),
            llm_disable_reasoning: parsed.llm.disable_reasoning,
            llm_system_prompt: parsed.llm.system_prompt.trim().to_string(),
            s2_api_key: parsed.providers.s2_api_key.trim().to_string(),
            openalex_email: parsed.providers.openalex_email.trim().to_string(),
            source_path: path.display().to_string(),
        })
    }

    fn apply_env(&mut self) {
        apply_env_string("PAPERFETCH_LLM_BASE_URL", &mut self.llm_base_url);
        apply_env_string("PAPERFETCH_LLM_API_KEY", &mut self.llm_api_key);
        apply_env_string("PAPERFETCH_LLM_MODEL", &mut self.llm_model);
        apply_env_string("PAPERFETCH_LLM_SYSTEM_PROMPT", &mut self.llm_system_prompt);
        apply_env_string("PAPERFETCH_S2_API_KEY", &mut self.s2_api_key);
        apply_env_string("PAPERFETCH_OPENALEX_EMAIL", &mut self.openalex_email);
        if let Ok(value) = std::env::var("PAPERFETCH_LLM_DISABLE_REASONING") {
            self.llm_disable_reasoning = parse_bool(&value);
        }
    }

    fn clear_placeholders(&mut self) {
        for field in [
            &mut self.llm_base_url,
            &mut self.llm_api_key,
            &mut self.llm_model,
            &mut self.llm_system_prompt,
            &mut self.s2_api_key,
            &mut self.openalex_email,
        ] {
            if PLACEHOLDERS.contains(&field.as_str()) {
                field.clear();
            }
        }
    }

    /// Optional values passed to provider constructors
    pub fn s2_api_key(&self) -> Option<String> {
        non_empty(&self.s2_api_key)
    }

    pub fn openalex_email(&self) -> Option<String> {
        non_empty(&self.openalex_email)
    }

    /// Validate the LLM settings and produce client options.
    pub fn llm_options(&self, timeout: Duration) -> Result<LlmOptions, ConfigError> {
        let mut missing = Vec::new();
        if self.llm_base_url.is_empty() {
            missing.push("llm.base_url");
        }
        if self.llm_api_key.is_empty() {
            missing.push("llm.api_key");
        }
        if self.llm_model.is_empty() {
            missing.push("llm.model");
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingLlm {
                fields: missing.join(", "),
                source_path: self.source_path.clone(),
            });
        }
        if !self.llm_base_url.starts_with("http://") && !self.llm_base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidBaseUrl);
        }
        if timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(LlmOptions {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            timeout,
            disable_reasoning: self.llm_disable_reasoning,
            system_prompt: self.llm_system_prompt.clone(),
        })
    }
}

fn pick_config_path() -> Result<Option<PathBuf>, ConfigError> {
    if let Ok(configured) = std::env::var(CONFIG_ENV_VAR) {
        let configured = configured.trim();
        if !configured.is_empty() {
            let path = PathBuf::from(configured);
            if !path.exists() {
                return Err(ConfigError::NotFound(path));
            }
            return Ok(Some(path));
        }
    }
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(Some(local));
    }
    if let Some(config_dir) = dirs::config_dir() {
        let user = config_dir.join("paperfetch").join("config.toml");
        if user.exists() {
            return Ok(Some(user));
        }
    }
    Ok(None)
}

fn apply_env_string(var: &str, target: &mut String) {
    if let Ok(value) = std::env::var(var) {
        let value = value.trim();
        if !value.is_empty() {
            *target = value.to_string();
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
