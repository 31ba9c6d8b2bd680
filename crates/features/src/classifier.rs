//! Sentiment classifier capabilities.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use earnings_core::{EarningsError, Polarity, Result, SentimentClassifier};

use crate::text::words;

// ── Lexicon classifier ──────────────────────────────────────────

const POSITIVE_WORDS: &[&str] = &[
    "accelerate", "accelerated", "achieve", "achieved", "advantage", "beat", "benefit",
    "confident", "confidence", "deliver", "delivered", "encouraged", "excellent", "exceeded",
    "excited", "expand", "expanded", "expansion", "favorable", "gain", "gains", "grew",
    "growth", "healthy", "improve", "improved", "improvement", "improving", "momentum",
    "optimistic", "outperformed", "outstanding", "pleased", "positive", "profitable",
    "record", "robust", "solid", "strength", "strong", "stronger", "success", "successful",
    "upside",
];

const NEGATIVE_WORDS: &[&str] = &[
    "adverse", "challenge", "challenges", "challenging", "concern", "concerns", "decline",
    "declined", "declining", "decrease", "decreased", "deteriorate", "deterioration",
    "difficult", "disappointing", "downturn", "headwind", "headwinds", "impairment", "issue",
    "issues", "loss", "losses", "miss", "missed", "negative", "pressure", "problem",
    "problems", "shortfall", "slowdown", "weak", "weaker", "weakness", "worse",
];

const NEGATORS: &[&str] = &[
    "no", "not", "never", "without", "neither", "nor", "cannot", "don't", "doesn't",
    "didn't", "isn't", "aren't", "wasn't", "weren't", "won't",
];

/// Tokens before a sentiment word that a negator may occupy.
const NEGATION_WINDOW: usize = 3;

/// Deterministic financial-lexicon classifier.
///
/// `score = (pos - neg) / (pos + neg)` over lexicon hits, where a hit preceded
/// by a negator within three tokens counts for the opposite side. Confidence
/// grows with the number of hits: `hits / (hits + 1)`.
pub struct LexiconClassifier {
    id: String,
    version: String,
    max_input_tokens: usize,
    batch_size: usize,
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negators: HashSet<&'static str>,
}

impl LexiconClassifier {
    pub fn new(id: &str, version: &str, max_input_tokens: usize, batch_size: usize) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            max_input_tokens,
            batch_size,
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negators: NEGATORS.iter().copied().collect(),
        }
    }

    pub fn score(&self, text: &str) -> Polarity {
        let tokens: Vec<String> = words(text)
            .into_iter()
            .map(|w| w.to_lowercase().replace('\u{2019}', "'"))
            .collect();
        let mut pos = 0usize;
        let mut neg = 0usize;
        for (i, token) in tokens.iter().enumerate() {
            let sign = if self.positive.contains(token.as_str()) {
                1
            } else if self.negative.contains(token.as_str()) {
                -1
            } else {
                continue;
            };
            let negated = tokens[i.saturating_sub(NEGATION_WINDOW)..i]
                .iter()
                .any(|t| self.negators.contains(t.as_str()));
            if (sign > 0) != negated {
                pos += 1;
            } else {
                neg += 1;
            }
        }
        let hits = pos + neg;
        if hits == 0 {
            return Polarity::new(0.0, 0.0);
        }
        let score = (pos as f64 - neg as f64) / hits as f64;
        Polarity::new(score, hits as f64 / (hits as f64 + 1.0))
    }
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new("finance-lexicon", "1", 512, 32)
    }
}

#[async_trait]
impl SentimentClassifier for LexiconClassifier {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn classify(&self, chunks: &[String]) -> Result<Vec<Polarity>> {
        Ok(chunks.iter().map(|c| self.score(c)).collect())
    }
}

// ── Remote classifier ───────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    model: &'a str,
    texts: &'a [String],
}

/// Class probabilities for one text, as returned by FinBERT-style servers.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClassProbabilities {
    pub positive: f64,
    pub negative: f64,
    #[serde(default)]
    pub neutral: f64,
}

impl ClassProbabilities {
    /// `positive - negative`, with the top class probability as confidence.
    pub fn polarity(&self) -> Polarity {
        let confidence = self.positive.max(self.negative).max(self.neutral);
        Polarity::new(self.positive - self.negative, confidence)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Results { results: Vec<ClassProbabilities> },
    List(Vec<ClassProbabilities>),
}

impl ClassifyResponse {
    fn into_results(self) -> Vec<ClassProbabilities> {
        match self {
            ClassifyResponse::Results { results } => results,
            ClassifyResponse::List(results) => results,
        }
    }
}

/// Classifier served over HTTP: `POST {endpoint}` with
/// `{"model": id, "texts": [...]}`.
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    id: String,
    version: String,
    max_input_tokens: usize,
    batch_size: usize,
}

impl HttpClassifier {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        id: &str,
        version: &str,
        max_input_tokens: usize,
        batch_size: usize,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EarningsError::ClassifierUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            id: id.to_string(),
            version: version.to_string(),
            max_input_tokens,
            batch_size,
        })
    }
}

#[async_trait]
impl SentimentClassifier for HttpClassifier {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn health_check(&self) -> Result<()> {
        self.classify(&["ok".to_string()]).await.map_err(|e| {
            EarningsError::ClassifierUnavailable(format!("{} at {}: {}", self.id, self.endpoint, e))
        })?;
        info!("🧠 Classifier {}@{} ready at {}", self.id, self.version, self.endpoint);
        Ok(())
    }

    async fn classify(&self, chunks: &[String]) -> Result<Vec<Polarity>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Classifier request: {} chunks to {}", chunks.len(), self.endpoint);

        let mut req = self.client.post(&self.endpoint).json(&ClassifyRequest {
            model: &self.id,
            texts: chunks,
        });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        // an unreachable or failing service stops the run
        let resp = req.send().await.map_err(|e| {
            EarningsError::ClassifierUnavailable(format!("{}: {}", self.endpoint, e))
        })?;
        if resp.status().is_server_error() {
            return Err(EarningsError::ClassifierUnavailable(format!(
                "{} returned HTTP {}",
                self.endpoint,
                resp.status()
            )));
        }
        if !resp.status().is_success() {
            return Err(EarningsError::Classifier(format!(
                "{} returned HTTP {}",
                self.endpoint,
                resp.status()
            )));
        }
        let results = resp.json::<ClassifyResponse>().await?.into_results();
        if results.len() != chunks.len() {
            return Err(EarningsError::Classifier(format!(
                "expected {} scores, got {}",
                chunks.len(),
                results.len()
            )));
        }
        Ok(results.iter().map(ClassProbabilities::polarity).collect())
    }
}
