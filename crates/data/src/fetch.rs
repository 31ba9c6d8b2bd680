//! Market-data fetch with bounded retry and request spacing.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use earnings_core::utils::parse_price_date;
use earnings_core::{EarningsError, PricePoint, PriceSeries, PriceSource, Result};

use crate::prices::{price_path, save_price_csv};

// ── HTTP source ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DailyClose {
    #[serde(alias = "Date")]
    date: String,
    #[serde(alias = "Close")]
    close: f64,
}

/// `GET {base_url}/prices/{ticker}` returning `[{"date", "close"}]`.
pub struct HttpPriceSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPriceSource {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries> {
        let url = format!("{}/prices/{}", self.base_url, ticker);
        debug!("Price request: {}", url);

        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(EarningsError::Network(format!("{}: HTTP {}", url, status)));
        }
        if !status.is_success() {
            return Err(EarningsError::Price(format!("{}: HTTP {}", url, status)));
        }

        let records: Vec<DailyClose> = resp.json().await?;
        if records.is_empty() {
            return Err(EarningsError::Price(format!("no prices for {}", ticker)));
        }
        let mut points = records
            .into_iter()
            .map(|r| {
                let date = parse_price_date(&r.date)
                    .ok_or_else(|| EarningsError::Price(format!("{}: bad date {:?}", ticker, r.date)))?;
                Ok(PricePoint { date, close: r.close })
            })
            .collect::<Result<Vec<_>>>()?;
        points.sort_by_key(|p| p.date);
        PriceSeries::new(ticker, points)
    }
}

// ── Retry policy ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Minimum spacing between consecutive requests.
    pub min_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            min_interval: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (1-based): `base · 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Only connection-level failures and throttling are worth retrying.
fn is_transient(err: &EarningsError) -> bool {
    matches!(err, EarningsError::Network(_))
}

/// Wraps a source with retries and a shared request rate limit.
pub struct ResilientSource<S> {
    inner: S,
    policy: RetryPolicy,
    last_request: Mutex<Option<Instant>>,
}

impl<S: PriceSource> ResilientSource<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            last_request: Mutex::new(None),
        }
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let ready = prev + self.policy.min_interval;
            if ready > Instant::now() {
                tokio::time::sleep_until(ready).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl<S: PriceSource> PriceSource for ResilientSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            self.throttle().await;
            match self.inner.fetch_daily(ticker).await {
                Ok(series) => return Ok(series),
                Err(e) if is_transient(&e) && attempt < max_attempts => {
                    let wait = self.policy.backoff(attempt);
                    warn!(
                        "Price fetch for {} failed (attempt {}/{}): {}, retrying in {:?}",
                        ticker, attempt, max_attempts, e, wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(EarningsError::Price(format!(
                        "{} after {} attempt(s): {}",
                        ticker, attempt, e
                    )))
                }
            }
        }
    }
}

// ── Bulk download ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchSummary {
    pub fetched: Vec<String>,
    pub skipped_existing: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Fetch each ticker's prices into `<dir>/<TICKER>.csv`, skipping tickers
/// already on disk. A failing ticker is recorded and the rest continue.
pub async fn download_prices<S: PriceSource + ?Sized>(
    source: &S,
    tickers: &[String],
    dir: &Path,
) -> FetchSummary {
    let mut summary = FetchSummary::default();
    for ticker in tickers {
        let path = price_path(dir, ticker);
        if path.is_file() {
            debug!("{} already present at {}", ticker, path.display());
            summary.skipped_existing.push(ticker.clone());
            continue;
        }
        let saved = match source.fetch_daily(ticker).await {
            Ok(series) => save_price_csv(&path, &series).map(|_| series.len()),
            Err(e) => Err(e),
        };
        match saved {
            Ok(n) => {
                info!("📈 {}: saved {} daily closes", ticker, n);
                summary.fetched.push(ticker.clone());
            }
            Err(e) => {
                warn!("❌ {}: {}", ticker, e);
                summary.failed.push((ticker.clone(), e.to_string()));
            }
        }
    }
    summary
}
