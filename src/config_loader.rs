use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file read when neither `--config` nor `FILTER_CONFIG` is given
pub const DEFAULT_CONFIG_FILE: &str = "content_filter.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub explainer: ExplainerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    pub repo_id: String,
    pub revision: String,
    /// Directory holding `config.json`, `tokenizer.json` and
    /// `model.safetensors`. When set the hub is never contacted.
    #[serde(default)]
    pub local_dir: Option<PathBuf>,
    pub device: String,
    pub max_length: usize,
    pub labels: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            repo_id: "distilbert-base-uncased".to_string(),
            revision: "main".to_string(),
            local_dir: None,
            device: "cpu".to_string(),
            max_length: 512,
            labels: vec!["allowed".to_string(), "blocked".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecisionConfig {
    pub block_threshold: f32,
    pub blocked_index: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            block_threshold: 0.913,
            blocked_index: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplainerMethod {
    Permutation,
    Occlusion,
}

impl ExplainerMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplainerMethod::Permutation => "permutation",
            ExplainerMethod::Occlusion => "occlusion",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExplainerConfig {
    pub method: ExplainerMethod,
    pub samples: usize,
    pub seed: u64,
    pub batch_size: usize,
    pub baseline_token: String,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            method: ExplainerMethod::Permutation,
            samples: 8,
            seed: 42,
            batch_size: 32,
            baseline_token: "[MASK]".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl FilterConfig {
    /// Reject values the filter cannot run with
    pub fn validate(&self) -> Result<(), String> {
        let threshold = self.decision.block_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(format!(
                "decision.block_threshold must be within [0, 1], got {threshold}"
            ));
        }
        if self.model.labels.len() < 2 {
            return Err("model.labels must name at least two classes".to_string());
        }
        if self.decision.blocked_index >= self.model.labels.len() {
            return Err(format!(
                "decision.blocked_index {} out of range for {} labels",
                self.decision.blocked_index,
                self.model.labels.len()
            ));
        }
        if self.model.max_length < 2 {
            return Err("model.max_length must leave room for special tokens".to_string());
        }
        if self.explainer.samples == 0 {
            return Err("explainer.samples must be at least 1".to_string());
        }
        if self.explainer.batch_size == 0 {
            return Err("explainer.batch_size must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Resolve which TOML file to read: explicit path, then `FILTER_CONFIG`,
/// then [`DEFAULT_CONFIG_FILE`].
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("FILTER_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn load_config(explicit: Option<&Path>) -> Result<FilterConfig, figment::Error> {
    let figment = Figment::from(Serialized::defaults(FilterConfig::default()))
        .merge(Toml::file(config_path(explicit)))
        .merge(Env::prefixed("FILTER_").split("__"));

    let config: FilterConfig = figment.extract()?;
    config.validate().map_err(figment::Error::from)?;

    Ok(config)
}
