use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::PriceSeries;

/// Classifier output for one text chunk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Polarity {
    /// Signed score in [-1.0, +1.0]
    pub score: f64,
    /// Classifier confidence in [0.0, 1.0]
    pub confidence: f64,
}

impl Polarity {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self {
            score: score.clamp(-1.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Text-classification capability injected into feature extraction.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    fn id(&self) -> &str;
    fn version(&self) -> &str;
    /// Largest chunk, in word tokens, the classifier accepts.
    fn max_input_tokens(&self) -> usize;
    /// Chunks per `classify` call.
    fn batch_size(&self) -> usize {
        32
    }
    /// Called once per run before any record is processed.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
    /// Score each chunk. The result has one entry per input chunk, in order.
    async fn classify(&self, chunks: &[String]) -> Result<Vec<Polarity>>;
}

/// Source of daily closes for one ticker.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries>;
}
