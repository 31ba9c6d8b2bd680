//! Stage runner: corpus → parse → features, prices → returns, assembly.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use earnings_config::{AppConfig, ClassifierKind, FetchConfig};
use earnings_core::utils::{content_key, normalize_ticker};
use earnings_core::{
    EarningsError, FeatureRecord, ManagementRoster, ParseConfidence, ParsedTranscript,
    PriceSource, Result, ReturnRecord, SentimentClassifier, Transcript,
};
use earnings_data::{
    download_prices, load_roster, ArtifactKind, ArtifactStore, Corpus, CorpusEntry,
    CsvPriceSource, FetchSummary, HttpPriceSource, ResilientSource, RetryPolicy,
};
use earnings_dataset::{read_jsonl, write_analysis_csv, write_jsonl, AssemblySummary, DatasetAssembler};
use earnings_features::{FeatureExtractor, HttpClassifier, LexiconClassifier, Lexicons};
use earnings_returns::ReturnCalculator;
use earnings_transcript::{ParserOptions, TranscriptParser, PARSER_VERSION};

pub const PARSED_FILE: &str = "parsed.jsonl";
pub const FEATURES_FILE: &str = "features.jsonl";
pub const RETURNS_FILE: &str = "returns.jsonl";
pub const ANALYSIS_FILE: &str = "analysis.csv";
pub const SUMMARY_FILE: &str = "run_summary.json";

// ── Run Summary ─────────────────────────────────────────────────────

/// Per-run counts of processed, cached and recovered-from records.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub transcripts: usize,
    /// `.txt` files without a recognizable call date.
    pub skipped_files: usize,
    pub unreadable_transcripts: usize,
    pub parsed: usize,
    pub parse_cache_hits: usize,
    pub low_confidence_parses: usize,
    pub feature_records: usize,
    pub feature_cache_hits: usize,
    pub feature_failures: usize,
    pub return_records: usize,
    pub tickers_without_prices: usize,
    pub invalid_price_files: usize,
    pub assembly: Option<AssemblySummary>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            transcripts: 0,
            skipped_files: 0,
            unreadable_transcripts: 0,
            parsed: 0,
            parse_cache_hits: 0,
            low_confidence_parses: 0,
            feature_records: 0,
            feature_cache_hits: 0,
            feature_failures: 0,
            return_records: 0,
            tickers_without_prices: 0,
            invalid_price_files: 0,
            assembly: None,
        }
    }

    pub fn log(&self) {
        info!("═══ Run {} ═══", self.run_id);
        if self.transcripts > 0 {
            info!(
                "  Transcripts: {} found, {} parsed ({} cached, {} low confidence), {} unreadable, {} undated files skipped",
                self.transcripts,
                self.parsed,
                self.parse_cache_hits,
                self.low_confidence_parses,
                self.unreadable_transcripts,
                self.skipped_files
            );
        }
        if self.feature_records > 0 || self.feature_failures > 0 {
            info!(
                "  Features:    {} records ({} cached), {} failed",
                self.feature_records, self.feature_cache_hits, self.feature_failures
            );
        }
        if self.return_records > 0 || self.tickers_without_prices > 0 || self.invalid_price_files > 0 {
            info!(
                "  Returns:     {} records, {} tickers without prices, {} unusable price files",
                self.return_records, self.tickers_without_prices, self.invalid_price_files
            );
        }
        if let Some(a) = &self.assembly {
            info!(
                "  Dataset:     {} rows ({} matched, {} features-only, {} returns-only)",
                a.rows, a.matched, a.features_only, a.returns_only
            );
        }
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shared Handles ──────────────────────────────────────────────────

/// Word lists and classifier for one run. Fails when either is unavailable.
pub async fn build_extractor(config: &AppConfig) -> Result<FeatureExtractor> {
    let lex = &config.lexicon;
    let lexicons = Lexicons::load(
        lex.uncertainty_path.as_deref(),
        lex.forward_looking_path.as_deref(),
        lex.disable_forward_looking,
    )?;

    let c = &config.classifier;
    let classifier: Arc<dyn SentimentClassifier> = match c.kind {
        ClassifierKind::Lexicon => Arc::new(LexiconClassifier::new(
            &c.id,
            &c.version,
            c.max_input_tokens,
            c.batch_size,
        )),
        ClassifierKind::Http => {
            let endpoint = c.endpoint.as_deref().ok_or_else(|| {
                EarningsError::Config("classifier.endpoint is required for kind = \"http\"".into())
            })?;
            Arc::new(HttpClassifier::new(
                endpoint,
                c.api_key.clone(),
                &c.id,
                &c.version,
                c.max_input_tokens,
                c.batch_size,
                c.timeout_secs,
            )?)
        }
    };
    classifier.health_check().await?;

    let extractor = FeatureExtractor::new(classifier, Arc::new(lexicons));
    info!("🧠 Classifier {} ready ({})", extractor.classifier_label(), extractor.fingerprint());
    Ok(extractor)
}

pub fn retry_policy(fetch: &FetchConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: fetch.max_attempts,
        base_delay: Duration::from_millis(fetch.base_delay_ms),
        max_delay: Duration::from_millis(fetch.max_delay_ms),
        min_interval: Duration::from_millis(fetch.min_interval_ms),
    }
}

// ── Cache Keys ──────────────────────────────────────────────────────

/// Hash of everything that determines a parse.
pub fn parse_key(options: &ParserOptions, roster: &ManagementRoster, transcript: &Transcript) -> String {
    let names = roster.names_for(&transcript.ticker).join("\n");
    let date = transcript.call_date.to_string();
    let fingerprint = options.fingerprint();
    content_key(&[
        PARSER_VERSION,
        transcript.ticker.as_str(),
        date.as_str(),
        names.as_str(),
        fingerprint.as_str(),
        transcript.text.as_str(),
    ])
}

/// Hash of the parsed transcript plus the extractor fingerprint.
pub fn feature_key(fingerprint: &str, parsed: &ParsedTranscript) -> Result<String> {
    let parsed = serde_json::to_string(parsed)?;
    Ok(content_key(&[fingerprint, parsed.as_str()]))
}

fn cached<T: DeserializeOwned>(store: Option<&ArtifactStore>, kind: ArtifactKind, key: &str) -> Option<T> {
    let store = store?;
    match store.get(kind, key) {
        Ok(value) => value,
        Err(e) => {
            warn!("Cache read failed, recomputing: {}", e);
            None
        }
    }
}

fn remember<T: Serialize>(store: Option<&ArtifactStore>, kind: ArtifactKind, key: &str, value: &T) {
    if let Some(store) = store {
        if let Err(e) = store.put(kind, key, value) {
            warn!("Cache write failed: {}", e);
        }
    }
}

fn parse_entry(
    parser: &TranscriptParser,
    roster: &ManagementRoster,
    store: Option<&ArtifactStore>,
    entry: &CorpusEntry,
) -> Result<(ParsedTranscript, bool)> {
    let transcript = entry.load()?;
    let key = parse_key(parser.options(), roster, &transcript);
    if let Some(hit) = cached(store, ArtifactKind::Parse, &key) {
        return Ok((hit, true));
    }
    let parsed = parser.parse(&transcript, roster);
    remember(store, ArtifactKind::Parse, &key, &parsed);
    Ok((parsed, false))
}

// ── Pipeline ────────────────────────────────────────────────────────

pub struct Pipeline {
    config: AppConfig,
    parser: Arc<TranscriptParser>,
    store: Option<Arc<ArtifactStore>>,
}

impl Pipeline {
    /// Opens the artifact cache named in the config. A cache that cannot be
    /// opened disables caching for the run.
    pub fn new(config: AppConfig) -> Self {
        let store = config.paths.cache_db.as_ref().and_then(|path| match ArtifactStore::open(path) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!("⚠️ Artifact cache unavailable, running uncached: {}", e);
                None
            }
        });
        Self::with_store(config, store)
    }

    pub fn with_store(config: AppConfig, store: Option<Arc<ArtifactStore>>) -> Self {
        let options = ParserOptions {
            min_boundary_confidence: config.parser.min_boundary_confidence,
            infer_management_from_title: config.parser.infer_management_from_title,
        };
        Self {
            parser: Arc::new(TranscriptParser::new(options)),
            config,
            store,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn output(&self, name: &str) -> PathBuf {
        self.config.paths.output_dir.join(name)
    }

    fn roster(&self) -> Result<ManagementRoster> {
        match &self.config.paths.roster {
            Some(path) => load_roster(path),
            None => Ok(ManagementRoster::new()),
        }
    }

    fn calculator(&self) -> Result<ReturnCalculator> {
        ReturnCalculator::new(&self.config.returns.horizons, self.config.returns.max_event_lag_days)
    }

    fn discover(&self) -> Result<Corpus> {
        Corpus::discover(&self.config.paths.transcripts_dir)
    }

    /// Parse every corpus entry on a bounded blocking pool. Output follows
    /// corpus order; unreadable transcripts are skipped and counted.
    pub async fn parse_corpus(&self, corpus: &Corpus, summary: &mut RunSummary) -> Result<Vec<ParsedTranscript>> {
        let roster = Arc::new(self.roster()?);
        let workers = self.config.pipeline.workers.max(1);

        let jobs = corpus.entries.iter().cloned().map(|entry| {
            let parser = Arc::clone(&self.parser);
            let roster = Arc::clone(&roster);
            let store = self.store.clone();
            async move {
                let path = entry.path.clone();
                let joined = tokio::task::spawn_blocking(move || {
                    parse_entry(&parser, &roster, store.as_deref(), &entry)
                })
                .await;
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(e) => Err(EarningsError::Parse(format!("parse worker failed: {}", e))),
                };
                (path, outcome)
            }
        });
        let outcomes: Vec<_> = stream::iter(jobs).buffered(workers).collect().await;

        summary.transcripts += corpus.entries.len();
        summary.skipped_files += corpus.skipped.len();
        let mut parsed = Vec::with_capacity(outcomes.len());
        let mut hits = 0usize;
        for (path, outcome) in outcomes {
            match outcome {
                Ok((record, hit)) => {
                    if hit {
                        hits += 1;
                    }
                    if record.confidence == ParseConfidence::Low {
                        summary.low_confidence_parses += 1;
                    }
                    parsed.push(record);
                }
                Err(e) => {
                    warn!("⚠️ Skipping {}: {}", path.display(), e);
                    summary.unreadable_transcripts += 1;
                }
            }
        }
        summary.parsed += parsed.len();
        summary.parse_cache_hits += hits;
        info!("📝 Parsed {} transcripts ({} from cache)", parsed.len(), hits);
        Ok(parsed)
    }

    /// Extract features with at most `pipeline.workers` records in flight.
    /// A classifier outage aborts, as does a batch in which every record
    /// failed at the classifier. Any other failure skips the record.
    pub async fn extract_features(
        &self,
        extractor: &FeatureExtractor,
        parsed: &[ParsedTranscript],
        summary: &mut RunSummary,
    ) -> Result<Vec<FeatureRecord>> {
        let fingerprint = extractor.fingerprint();
        let fingerprint = fingerprint.as_str();
        let store = self.store.as_deref();
        let workers = self.config.pipeline.workers.max(1);

        let outcomes: Vec<Result<(FeatureRecord, bool)>> = stream::iter(parsed)
            .map(|record| async move {
                let key = feature_key(fingerprint, record)?;
                if let Some(hit) = cached::<FeatureRecord>(store, ArtifactKind::Features, &key) {
                    return Ok((hit, true));
                }
                let features = extractor.extract(record).await?;
                remember(store, ArtifactKind::Features, &key, &features);
                Ok::<(FeatureRecord, bool), EarningsError>((features, false))
            })
            .buffered(workers)
            .collect()
            .await;

        let mut records = Vec::with_capacity(outcomes.len());
        let mut hits = 0usize;
        let mut classifier_failures = 0usize;
        let mut last_error = None;
        for (outcome, source) in outcomes.into_iter().zip(parsed) {
            match outcome {
                Ok((record, hit)) => {
                    if hit {
                        hits += 1;
                    }
                    records.push(record);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("⚠️ Features failed for {} {}: {}", source.ticker, source.call_date, e);
                    summary.feature_failures += 1;
                    if matches!(e, EarningsError::Classifier(_) | EarningsError::Network(_)) {
                        classifier_failures += 1;
                    }
                    last_error = Some(e);
                }
            }
        }
        if !parsed.is_empty() && classifier_failures == parsed.len() {
            let cause = last_error.map(|e| e.to_string()).unwrap_or_default();
            return Err(EarningsError::ClassifierUnavailable(format!(
                "{} failed on all {} calls, last error: {}",
                extractor.classifier_label(),
                parsed.len(),
                cause
            )));
        }
        summary.feature_records += records.len();
        summary.feature_cache_hits += hits;
        info!("🔎 Extracted features for {} calls ({} from cache)", records.len(), hits);
        Ok(records)
    }

    /// Returns for every call of every ticker with a price file. Tickers
    /// without one produce no records; unusable files produce not-computed ones.
    pub async fn compute_returns(
        &self,
        calls: &BTreeMap<String, Vec<NaiveDate>>,
        summary: &mut RunSummary,
    ) -> Result<Vec<ReturnRecord>> {
        let calculator = self.calculator()?;
        let source = CsvPriceSource::new(self.config.paths.prices_dir.clone());

        let mut records = Vec::new();
        for (ticker, dates) in calls {
            if !source.has(ticker) {
                warn!("No price file for {}, its calls stay unmatched", ticker);
                summary.tickers_without_prices += 1;
                continue;
            }
            match source.fetch_daily(ticker).await {
                Ok(series) => records.extend(dates.iter().map(|d| calculator.compute(&series, *d))),
                Err(e) => {
                    warn!("⚠️ Unusable prices for {}: {}", ticker, e);
                    summary.invalid_price_files += 1;
                    records.extend(dates.iter().map(|d| calculator.not_computed(ticker, *d)));
                }
            }
        }
        summary.return_records += records.len();
        info!("📈 Computed returns for {} calls across {} tickers", records.len(), calls.len());
        Ok(records)
    }

    fn finish(&self, summary: RunSummary) -> Result<RunSummary> {
        summary.log();
        let path = self.output(SUMMARY_FILE);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
        Ok(summary)
    }

    // ── Stage Commands ──────────────────────────────────────────────

    pub async fn run_parse(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::new();
        let corpus = self.discover()?;
        let parsed = self.parse_corpus(&corpus, &mut summary).await?;
        write_jsonl(&self.output(PARSED_FILE), &parsed)?;
        self.finish(summary)
    }

    pub async fn run_features(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::new();
        let extractor = build_extractor(&self.config).await?;
        let parsed: Vec<ParsedTranscript> = read_jsonl(&self.output(PARSED_FILE))?;
        let features = self.extract_features(&extractor, &parsed, &mut summary).await?;
        write_jsonl(&self.output(FEATURES_FILE), &features)?;
        self.finish(summary)
    }

    pub async fn run_returns(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::new();
        let corpus = self.discover()?;
        let returns = self.compute_returns(&corpus.calls_by_ticker(), &mut summary).await?;
        write_jsonl(&self.output(RETURNS_FILE), &returns)?;
        self.finish(summary)
    }

    pub fn run_assemble(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::new();
        let calculator = self.calculator()?;
        let features: Vec<FeatureRecord> = read_jsonl(&self.output(FEATURES_FILE))?;
        let returns: Vec<ReturnRecord> = read_jsonl(&self.output(RETURNS_FILE))?;
        let assembly = DatasetAssembler::new().assemble(features, returns);
        write_analysis_csv(&self.output(ANALYSIS_FILE), &assembly.rows, calculator.horizons())?;
        summary.assembly = Some(assembly.summary);
        self.finish(summary)
    }

    /// All stages in one pass. Run-level dependencies are checked before any
    /// record is processed, and nothing is written unless every stage succeeds.
    pub async fn run(&self) -> Result<RunSummary> {
        self.calculator()?;
        let extractor = build_extractor(&self.config).await?;
        self.run_with(&extractor).await
    }

    /// [`Pipeline::run`] with an already-built extractor.
    pub async fn run_with(&self, extractor: &FeatureExtractor) -> Result<RunSummary> {
        let mut summary = RunSummary::new();
        info!("🚀 Run {} starting", summary.run_id);

        let calculator = self.calculator()?;
        let corpus = self.discover()?;

        let parsed = self.parse_corpus(&corpus, &mut summary).await?;
        let features = self.extract_features(extractor, &parsed, &mut summary).await?;
        let returns = self.compute_returns(&corpus.calls_by_ticker(), &mut summary).await?;

        write_jsonl(&self.output(PARSED_FILE), &parsed)?;
        write_jsonl(&self.output(FEATURES_FILE), &features)?;
        write_jsonl(&self.output(RETURNS_FILE), &returns)?;

        let assembly = DatasetAssembler::new().assemble(features, returns);
        write_analysis_csv(&self.output(ANALYSIS_FILE), &assembly.rows, calculator.horizons())?;
        summary.assembly = Some(assembly.summary);
        self.finish(summary)
    }

    /// Download price files for `tickers`, or for every corpus ticker when empty.
    pub async fn fetch_prices(&self, tickers: &[String]) -> Result<FetchSummary> {
        let tickers: Vec<String> = if tickers.is_empty() {
            self.discover()?.tickers()
        } else {
            tickers.iter().map(|t| normalize_ticker(t)).collect()
        };

        let fetch = &self.config.fetch;
        let http = HttpPriceSource::new(&fetch.base_url, fetch.api_key.clone(), fetch.timeout_secs)?;
        let source = ResilientSource::new(http, retry_policy(fetch));
        info!("📦 Fetching prices for {} tickers from {}", tickers.len(), fetch.base_url);

        let result = download_prices(&source, &tickers, &self.config.paths.prices_dir).await;
        info!(
            "✅ Prices: {} fetched, {} already present, {} failed",
            result.fetched.len(),
            result.skipped_existing.len(),
            result.failed.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use earnings_core::{MatchStatus, NullReason, Polarity, SectionKind};
    use std::path::Path;

    const CALL: &str = "\
Acme Corp Q1 2024 Earnings Call
Jane Smith - Chief Executive Officer: Revenue grew this quarter.
Questions and Answers
Bob Lee - Analyst: Are you sure about the uncertain supply chain?
Jane Smith - Chief Executive Officer: We are very confident and see no issues ahead.
";

    const PRICES: &str = "\
Date,Close
2024-04-30,98.0
2024-05-02,100.0
2024-05-03,102.0
2024-05-06,101.0
2024-05-07,99.0
2024-05-08,97.0
2024-05-09,95.0
2024-05-10,96.0
";

    fn setup(root: &Path) -> AppConfig {
        let calls = root.join("Transcripts/ACME");
        std::fs::create_dir_all(&calls).unwrap();
        std::fs::write(calls.join("2024-May-02-ACME.txt"), CALL).unwrap();
        let prices = root.join("StockData");
        std::fs::create_dir_all(&prices).unwrap();
        std::fs::write(prices.join("ACME.csv"), PRICES).unwrap();

        let mut config = AppConfig::default();
        config.paths.transcripts_dir = root.join("Transcripts");
        config.paths.prices_dir = prices;
        config.paths.output_dir = root.join("output");
        config.paths.cache_db = None;
        config.pipeline.workers = 2;
        config
    }

    fn pipeline(config: AppConfig, store: &Arc<ArtifactStore>) -> Pipeline {
        Pipeline::with_store(config, Some(Arc::clone(store)))
    }

    #[tokio::test]
    async fn test_end_to_end_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path());
        let store = Arc::new(ArtifactStore::in_memory().unwrap());
        let summary = pipeline(config.clone(), &store).run().await.unwrap();

        assert_eq!(summary.parsed, 1);
        assert_eq!(summary.feature_records, 1);
        assert_eq!(summary.return_records, 1);
        assert_eq!(summary.assembly.as_ref().unwrap().matched, 1);

        let out = &config.paths.output_dir;
        let features: Vec<FeatureRecord> = read_jsonl(&out.join(FEATURES_FILE)).unwrap();
        let mgmt = features[0].section(SectionKind::QAManagement).unwrap();
        assert!(mgmt.sentiment.unwrap() > 0.0);
        let analysts = features[0].section(SectionKind::QAAnalysts).unwrap();
        assert!(analysts.uncertainty_ratio.unwrap() > 0.0);

        let returns: Vec<ReturnRecord> = read_jsonl(&out.join(RETURNS_FILE)).unwrap();
        let record = &returns[0];
        assert_eq!(record.event_day, NaiveDate::from_ymd_opt(2024, 5, 2));
        assert!((record.value(1).unwrap() - 0.02).abs() < 1e-12);
        assert!((record.value(5).unwrap() + 0.05).abs() < 1e-12);
        let ten = record.get(10).unwrap();
        assert_eq!(ten.value, None);
        assert_eq!(ten.null_reason, Some(NullReason::InsufficientTradingDays));
        assert!(ten.missing_data());

        let mut reader = csv::Reader::from_path(out.join(ANALYSIS_FILE)).unwrap();
        assert_eq!(reader.records().count(), 1);
        assert!(out.join(SUMMARY_FILE).is_file());
    }

    #[tokio::test]
    async fn test_second_run_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path());
        let store = Arc::new(ArtifactStore::in_memory().unwrap());

        let first = pipeline(config.clone(), &store).run().await.unwrap();
        assert_eq!(first.parse_cache_hits, 0);
        assert_eq!(first.feature_cache_hits, 0);

        let second = pipeline(config.clone(), &store).run().await.unwrap();
        assert_eq!(second.parse_cache_hits, 1);
        assert_eq!(second.feature_cache_hits, 1);
        assert_ne!(first.run_id, second.run_id);

        // a different uncertainty list changes the feature key only
        let list = dir.path().join("uncertainty.txt");
        std::fs::write(&list, "uncertain\nmaybe\n").unwrap();
        let mut changed = config;
        changed.lexicon.uncertainty_path = Some(list);
        let third = pipeline(changed, &store).run().await.unwrap();
        assert_eq!(third.parse_cache_hits, 1);
        assert_eq!(third.feature_cache_hits, 0);
    }

    #[tokio::test]
    async fn test_stage_commands() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path());
        let runner = Pipeline::with_store(config.clone(), None);

        runner.run_parse().await.unwrap();
        runner.run_features().await.unwrap();
        runner.run_returns().await.unwrap();
        let summary = runner.run_assemble().unwrap();
        assert_eq!(summary.assembly.unwrap().matched, 1);

        let mut reader = csv::Reader::from_path(config.paths.output_dir.join(ANALYSIS_FILE)).unwrap();
        let header = reader.headers().unwrap().clone();
        let row = reader.records().next().unwrap().unwrap();
        let col = |name: &str| header.iter().position(|h| h == name).unwrap();
        assert_eq!(&row[col("match_status")], "matched");
        assert_eq!(&row[col("ret_10d")], "");
        assert_eq!(&row[col("ret_10d_null_reason")], "insufficient_trading_days");
    }

    #[tokio::test]
    async fn test_missing_price_file_keeps_features() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path());
        std::fs::remove_file(config.paths.prices_dir.join("ACME.csv")).unwrap();

        let summary = Pipeline::with_store(config, None).run().await.unwrap();
        assert_eq!(summary.tickers_without_prices, 1);
        let assembly = summary.assembly.unwrap();
        assert_eq!(assembly.rows, 1);
        assert_eq!(assembly.features_only, 1);
    }

    #[tokio::test]
    async fn test_unusable_price_file_is_not_computed() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path());
        std::fs::write(config.paths.prices_dir.join("ACME.csv"), "Date,Open\n2024-05-02,1\n").unwrap();

        let runner = Pipeline::with_store(config.clone(), None);
        let summary = runner.run().await.unwrap();
        assert_eq!(summary.invalid_price_files, 1);
        let returns: Vec<ReturnRecord> = read_jsonl(&config.paths.output_dir.join(RETURNS_FILE)).unwrap();
        assert!(returns[0].returns.iter().all(|r| r.null_reason == Some(NullReason::NotComputed)));
    }

    #[tokio::test]
    async fn test_missing_word_list_aborts_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path());
        config.lexicon.uncertainty_path = Some(dir.path().join("missing.txt"));

        let err = Pipeline::with_store(config.clone(), None).run().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, EarningsError::LexiconUnavailable(_)));
        assert!(!config.paths.output_dir.join(ANALYSIS_FILE).exists());
    }

    /// Passes its health check, then fails every request.
    struct DroppedClassifier;

    #[async_trait]
    impl SentimentClassifier for DroppedClassifier {
        fn id(&self) -> &str {
            "dropped"
        }

        fn version(&self) -> &str {
            "1"
        }

        fn max_input_tokens(&self) -> usize {
            512
        }

        async fn classify(&self, _chunks: &[String]) -> Result<Vec<Polarity>> {
            Err(EarningsError::Network("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn test_classifier_failing_every_call_aborts_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path());
        let extractor = FeatureExtractor::new(Arc::new(DroppedClassifier), Arc::new(Lexicons::default()));

        let err = Pipeline::with_store(config.clone(), None).run_with(&extractor).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, EarningsError::ClassifierUnavailable(_)));
        assert!(!config.paths.output_dir.join(ANALYSIS_FILE).exists());
        assert!(!config.paths.output_dir.join(FEATURES_FILE).exists());
    }

    #[tokio::test]
    async fn test_unreadable_transcript_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path());
        // a directory with a transcript name cannot be read as a file
        std::fs::create_dir_all(dir.path().join("Transcripts/ACME/2024-Aug-01-ACME.txt")).unwrap();

        let summary = Pipeline::with_store(config, None).run().await.unwrap();
        assert_eq!(summary.transcripts, 2);
        assert_eq!(summary.unreadable_transcripts, 1);
        let assembly = summary.assembly.unwrap();
        assert_eq!(assembly.matched, 1);
        assert_eq!(assembly.returns_only, 1);
    }

    #[test]
    fn test_parse_key_tracks_roster_and_options() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let transcript = Transcript::new("ACME", date, CALL);
        let options = ParserOptions::default();
        let empty = ManagementRoster::new();
        let roster = ManagementRoster::new().with_names("ACME", &["Jane Smith"]);
        let other_ticker = ManagementRoster::new().with_names("ZED", &["Jane Smith"]);

        let base = parse_key(&options, &empty, &transcript);
        assert_eq!(base, parse_key(&options, &empty, &transcript));
        assert_ne!(base, parse_key(&options, &roster, &transcript));
        assert_eq!(base, parse_key(&options, &other_ticker, &transcript));

        let strict = ParserOptions { min_boundary_confidence: 0.9, ..ParserOptions::default() };
        assert_ne!(base, parse_key(&strict, &empty, &transcript));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = retry_policy(&FetchConfig::default());
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.min_interval, Duration::from_secs(1));
    }
}
