use thiserror::Error;

#[derive(Debug, Error)]
pub enum EarningsError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Feature error: {0}")]
    Feature(String),
    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),
    #[error("Classifier error: {0}")]
    Classifier(String),
    #[error("Word list unavailable: {0}")]
    LexiconUnavailable(String),
    #[error("Input unavailable: {0}")]
    InputUnavailable(String),
    #[error("Price error: {0}")]
    Price(String),
    #[error("Data error: {0}")]
    Data(String),
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(String),
}

impl EarningsError {
    /// Run-level failures: a missing dependency that makes every record of
    /// the run meaningless. Everything else is handled per record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EarningsError::ClassifierUnavailable(_)
                | EarningsError::LexiconUnavailable(_)
                | EarningsError::InputUnavailable(_)
                | EarningsError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EarningsError>;

impl From<reqwest::Error> for EarningsError {
    fn from(err: reqwest::Error) -> Self {
        EarningsError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for EarningsError {
    fn from(err: serde_json::Error) -> Self {
        EarningsError::Data(err.to_string())
    }
}

impl From<rusqlite::Error> for EarningsError {
    fn from(err: rusqlite::Error) -> Self {
        EarningsError::Cache(err.to_string())
    }
}

impl From<csv::Error> for EarningsError {
    fn from(err: csv::Error) -> Self {
        EarningsError::Data(err.to_string())
    }
}

impl From<std::io::Error> for EarningsError {
    fn from(err: std::io::Error) -> Self {
        EarningsError::Data(err.to_string())
    }
}
