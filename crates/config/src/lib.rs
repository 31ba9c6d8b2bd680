use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub parser: ParserConfig,
    pub classifier: ClassifierConfig,
    pub lexicon: LexiconConfig,
    pub returns: ReturnsConfig,
    pub fetch: FetchConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub transcripts_dir: PathBuf,
    pub prices_dir: PathBuf,
    pub output_dir: PathBuf,
    /// SQLite artifact cache; `None` disables caching.
    pub cache_db: Option<PathBuf>,
    /// TOML file of `TICKER = ["Name", ...]` management rosters.
    pub roster: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            transcripts_dir: PathBuf::from("Transcripts"),
            prices_dir: PathBuf::from("StockData"),
            output_dir: PathBuf::from("output"),
            cache_db: Some(PathBuf::from("output/cache.db")),
            roster: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Minimum score for a Q&A boundary marker to be accepted.
    pub min_boundary_confidence: f64,
    /// Attribute speakers with executive titles to management.
    pub infer_management_from_title: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_boundary_confidence: 0.5,
            infer_management_from_title: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    Lexicon,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub kind: ClassifierKind,
    /// Model identifier, e.g. `ProsusAI/finbert`.
    pub id: String,
    pub version: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub max_input_tokens: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::Lexicon,
            id: "finance-lexicon".to_string(),
            version: "1".to_string(),
            endpoint: None,
            api_key: None,
            max_input_tokens: 512,
            batch_size: 32,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    /// One term per line; built-in list when unset.
    pub uncertainty_path: Option<PathBuf>,
    pub forward_looking_path: Option<PathBuf>,
    /// Skip the forward-looking ratio entirely.
    pub disable_forward_looking: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReturnsConfig {
    /// Trading-day horizons.
    pub horizons: Vec<usize>,
    /// Calendar days an event day may lag the call date.
    pub max_event_lag_days: Option<u32>,
}

impl Default for ReturnsConfig {
    fn default() -> Self {
        Self {
            horizons: vec![1, 5, 10],
            max_event_lag_days: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Minimum spacing between requests to respect the provider quota.
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_key: None,
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            min_interval_ms: 1_000,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_default() -> Result<Self, ConfigError> {
        Self::from_file("config/default.toml")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.parser.min_boundary_confidence;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "parser.min_boundary_confidence must be in [0, 1], got {}",
                threshold
            )));
        }
        if self.returns.horizons.is_empty() {
            return Err(ConfigError::Invalid("returns.horizons must not be empty".into()));
        }
        if self.returns.horizons.contains(&0) {
            return Err(ConfigError::Invalid("returns.horizons must be positive".into()));
        }
        if self.classifier.max_input_tokens == 0 {
            return Err(ConfigError::Invalid("classifier.max_input_tokens must be positive".into()));
        }
        if self.classifier.batch_size == 0 {
            return Err(ConfigError::Invalid("classifier.batch_size must be positive".into()));
        }
        if self.classifier.kind == ClassifierKind::Http && self.classifier.endpoint.is_none() {
            return Err(ConfigError::Invalid("classifier.endpoint is required for kind = \"http\"".into()));
        }
        if self.pipeline.workers == 0 {
            return Err(ConfigError::Invalid("pipeline.workers must be positive".into()));
        }
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::Invalid("fetch.max_attempts must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.returns.horizons, vec![1, 5, 10]);
        assert_eq!(config.classifier.kind, ClassifierKind::Lexicon);
        assert_eq!(config.parser.min_boundary_confidence, 0.5);
        assert_eq!(config.pipeline.workers, 4);
    }

    #[test]
    fn test_partial_section() {
        let config = AppConfig::from_toml(
            r#"
            [returns]
            horizons = [1, 3]

            [classifier]
            kind = "http"
            id = "ProsusAI/finbert"
            endpoint = "http://localhost:9000/classify"
            "#,
        )
        .unwrap();
        assert_eq!(config.returns.horizons, vec![1, 3]);
        assert_eq!(config.classifier.kind, ClassifierKind::Http);
        assert_eq!(config.classifier.max_input_tokens, 512);
    }

    #[test]
    fn test_rejects_zero_horizon() {
        let err = AppConfig::from_toml("[returns]\nhorizons = [0, 5]").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_http_without_endpoint() {
        let err = AppConfig::from_toml("[classifier]\nkind = \"http\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let err = AppConfig::from_toml("[parser]\nmin_boundary_confidence = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
