use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Connection settings for one OpenAI-compatible endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// OpenAI API endpoint
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Environment variable name containing the API key
    #[serde(default = "default_env_var_api_key")]
    pub env_var_api_key: String,
    /// Inline API key, takes precedence over the environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            env_var_api_key: default_env_var_api_key(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Resolve the API key from the inline value or the configured environment variable
    pub fn resolve_api_key(&self) -> Result<String> {
        match &self.api_key {
            Some(key) => Ok(key.clone()),
            None => std::env::var(&self.env_var_api_key)
                .with_context(|| format!("Environment variable {} not found", self.env_var_api_key)),
        }
    }
}

/// Settings for the scoring (judge) model
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JudgeConfig {
    #[serde(flatten)]
    pub client: ClientConfig,
    /// Model used to judge responses
    #[serde(default = "default_judge_model")]
    pub model: String,
    /// Sampling temperature for judging
    #[serde(default)]
    pub temperature: f64,
    /// Optional cap on judge output tokens
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Minimum delay between consecutive judge calls
    #[serde(default = "default_request_interval")]
    pub request_interval_secs: f64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            model: default_judge_model(),
            temperature: 0.0,
            max_tokens: None,
            request_interval_secs: default_request_interval(),
        }
    }
}

/// Settings for the answer-generating models
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerConfig {
    #[serde(flatten)]
    pub client: ClientConfig,
    /// Models asked to answer every question
    #[serde(default)]
    pub models: Vec<String>,
    /// Temperature for response generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Maximum tokens for response generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// System prompt sent with every question
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Minimum delay between consecutive answer calls
    #[serde(default = "default_request_interval")]
    pub request_interval_secs: f64,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            models: Vec::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: default_system_prompt(),
            request_interval_secs: default_request_interval(),
        }
    }
}

/// What to do with a parsed score outside 1..=5
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Store it as-is; the report flags it
    #[default]
    Keep,
    /// Store it as absent
    Discard,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub out_of_range: OutOfRangePolicy,
    /// Factual accuracy at or below this value is reported as a low-accuracy case
    #[serde(default = "default_low_accuracy_threshold")]
    pub low_accuracy_threshold: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            out_of_range: OutOfRangePolicy::default(),
            low_accuracy_threshold: default_low_accuracy_threshold(),
        }
    }
}

/// Locations of the persisted collections
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "default_questions_path")]
    pub questions: PathBuf,
    #[serde(default = "default_evaluations_path")]
    pub evaluations: PathBuf,
    /// Earlier single-response evaluations to reuse, if any
    #[serde(default)]
    pub legacy_evaluations: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            questions: default_questions_path(),
            evaluations: default_evaluations_path(),
            legacy_evaluations: None,
        }
    }
}

fn default_api_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_env_var_api_key() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_judge_model() -> String {
    "gpt-4".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    200
}

fn default_request_interval() -> f64 {
    2.0
}

fn default_low_accuracy_threshold() -> u32 {
    2
}

fn default_system_prompt() -> String {
    "You are a helpful health information assistant. Provide accurate, evidence-based responses to health-related questions. Be concise but informative.".to_string()
}

fn default_questions_path() -> PathBuf {
    PathBuf::from("data/questions.json")
}

fn default_evaluations_path() -> PathBuf {
    PathBuf::from("data/evaluations_restructured.json")
}

/// Root configuration of a study
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (section, interval) in [
            ("judge", self.judge.request_interval_secs),
            ("answer", self.answer.request_interval_secs),
        ] {
            if !interval.is_finite() || interval < 0.0 {
                anyhow::bail!(
                    "[{}] request_interval_secs must be a finite, non-negative number of seconds, got {}",
                    section,
                    interval
                );
            }
        }
        Ok(())
    }
}
