//! LLM connection settings.
//!
//! Settings come from an optional YAML file and are then overridden by
//! whatever the command line or environment supplied:
//!
//! ```yaml
//! api_base: https://api.openai.com/v1
//! api_key: sk-...
//! model: gpt-3.5-turbo
//! timeout_secs: 60
//! max_retries: 0
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Extra attempts after the first failed call. Zero means a single call.
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
            max_retries: 0,
        }
    }
}

/// Values from the command line / environment that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct LlmOverrides {
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<usize>,
}

impl LlmConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&raw)?;
        info!(model = %config.model, api_base = %config.api_base, "Loaded LLM configuration");
        Ok(config)
    }

    /// Load `path` if given (defaults otherwise) and apply `overrides` on top.
    pub fn resolve(path: Option<&Path>, overrides: LlmOverrides) -> Result<Self> {
        let base = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(base.with_overrides(overrides))
    }

    pub fn with_overrides(mut self, overrides: LlmOverrides) -> Self {
        if let Some(api_base) = overrides.api_base {
            self.api_base = api_base;
        }
        if let Some(api_key) = overrides.api_key {
            self.api_key = api_key;
        }
        if let Some(model) = overrides.model {
            self.model = model;
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(max_retries) = overrides.max_retries {
            self.max_retries = max_retries;
        }
        self
    }
}
