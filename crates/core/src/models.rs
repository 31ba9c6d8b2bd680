use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EarningsError, Result};
use crate::types::{MatchStatus, NullReason, ParseConfidence, SectionKind, SpeakerRole};
use crate::utils::{normalize_person_name, normalize_ticker};

// ── Transcripts ──────────────────────────────────────────────

/// Raw transcript of one call. Immutable input of the parse stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub ticker: String,
    pub call_date: NaiveDate,
    pub text: String,
    pub source: Option<PathBuf>,
}

impl Transcript {
    pub fn new(ticker: &str, call_date: NaiveDate, text: impl Into<String>) -> Self {
        Self {
            ticker: normalize_ticker(ticker),
            call_date,
            text: text.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Half-open byte range `[start, end)` into the transcript text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ByteSpan {
    pub start: usize,
    pub end: usize,
}

impl ByteSpan {
    pub fn overlaps(&self, other: &ByteSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub title: Option<String>,
    pub affiliation: Option<String>,
    pub role: SpeakerRole,
    /// Content lines with boilerplate removed, joined by `\n`.
    pub text: String,
    pub span: ByteSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    pub utterances: Vec<Utterance>,
}

impl Section {
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            utterances: Vec::new(),
        }
    }

    /// Section text, one utterance per line.
    pub fn text(&self) -> String {
        self.utterances
            .iter()
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.iter().all(|u| u.text.trim().is_empty())
    }
}

/// Per-transcript counters of what the parser dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Malformed regions skipped (unattributed Q&A text, empty speaker blocks).
    pub skipped_regions: usize,
    /// Header, separator, page-number, timestamp and disclaimer lines.
    pub boilerplate_lines: usize,
    /// Operator utterances removed as call moderation.
    pub operator_utterances: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTranscript {
    pub ticker: String,
    pub call_date: NaiveDate,
    pub quarter: Option<String>,
    pub sections: Vec<Section>,
    pub confidence: ParseConfidence,
    pub boundary_score: Option<f64>,
    pub stats: ParseStats,
}

impl ParsedTranscript {
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Every utterance of every section, in source order.
    pub fn utterances_by_span(&self) -> Vec<&Utterance> {
        let mut all: Vec<&Utterance> = self
            .sections
            .iter()
            .flat_map(|s| s.utterances.iter())
            .collect();
        all.sort_by_key(|u| u.span);
        all
    }

    /// Source transcript minus stripped boilerplate, one utterance per line.
    pub fn reconstruct(&self) -> String {
        self.utterances_by_span()
            .iter()
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Management personnel per ticker, used to attribute speaker roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementRoster {
    names: BTreeMap<String, BTreeSet<String>>,
}

impl ManagementRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: &str, name: &str) {
        let name = normalize_person_name(name);
        if name.is_empty() {
            return;
        }
        self.names
            .entry(normalize_ticker(ticker))
            .or_default()
            .insert(name);
    }

    pub fn with_names(mut self, ticker: &str, names: &[&str]) -> Self {
        for name in names {
            self.insert(ticker, name);
        }
        self
    }

    pub fn contains(&self, ticker: &str, name: &str) -> bool {
        self.names
            .get(&normalize_ticker(ticker))
            .is_some_and(|set| set.contains(&normalize_person_name(name)))
    }

    /// Normalized names for one ticker, in sorted order.
    pub fn names_for(&self, ticker: &str) -> Vec<&str> {
        self.names
            .get(&normalize_ticker(ticker))
            .map(|set| set.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn ticker_count(&self) -> usize {
        self.names.len()
    }
}

// ── Features ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionFeatures {
    pub kind: SectionKind,
    /// Token-weighted mean polarity in [-1, 1].
    pub sentiment: Option<f64>,
    pub sentiment_confidence: Option<f64>,
    pub uncertainty_ratio: Option<f64>,
    pub forward_looking_ratio: Option<f64>,
    /// None whenever `null_reason` is set.
    pub word_count: Option<usize>,
    pub chunk_count: Option<usize>,
    pub null_reason: Option<NullReason>,
}

impl SectionFeatures {
    /// All metrics null, with the reason they could not be computed.
    pub fn null(kind: SectionKind, reason: NullReason) -> Self {
        Self {
            kind,
            sentiment: None,
            sentiment_confidence: None,
            uncertainty_ratio: None,
            forward_looking_ratio: None,
            word_count: None,
            chunk_count: None,
            null_reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub ticker: String,
    pub call_date: NaiveDate,
    pub quarter: Option<String>,
    pub confidence: ParseConfidence,
    /// `id@version` of the classifier that produced the scores.
    pub classifier: String,
    pub uncertainty_list: String,
    pub forward_looking_list: Option<String>,
    /// One entry per `SectionKind`, in `SectionKind::ALL` order.
    pub sections: Vec<SectionFeatures>,
}

impl FeatureRecord {
    pub fn section(&self, kind: SectionKind) -> Option<&SectionFeatures> {
        self.sections.iter().find(|s| s.kind == kind)
    }
}

// ── Prices & Returns ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closes for one ticker, strictly increasing by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    ticker: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(ticker: &str, points: Vec<PricePoint>) -> Result<Self> {
        for pair in points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(EarningsError::Price(format!(
                    "{}: dates not strictly increasing at {}",
                    ticker, pair[1].date
                )));
            }
        }
        if let Some(bad) = points.iter().find(|p| !p.close.is_finite() || p.close <= 0.0) {
            return Err(EarningsError::Price(format!(
                "{}: invalid close {} on {}",
                ticker, bad.close, bad.date
            )));
        }
        Ok(Self {
            ticker: normalize_ticker(ticker),
            points,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the first trading date on or after `date`.
    pub fn first_on_or_after(&self, date: NaiveDate) -> Option<usize> {
        let idx = self.points.partition_point(|p| p.date < date);
        (idx < self.points.len()).then_some(idx)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonReturn {
    /// Trading days after the event day.
    pub horizon: usize,
    pub value: Option<f64>,
    pub null_reason: Option<NullReason>,
}

impl HorizonReturn {
    pub fn computed(horizon: usize, value: f64) -> Self {
        Self {
            horizon,
            value: Some(value),
            null_reason: None,
        }
    }

    pub fn null(horizon: usize, reason: NullReason) -> Self {
        Self {
            horizon,
            value: None,
            null_reason: Some(reason),
        }
    }

    /// Null because the price window was too short (not "not computed").
    pub fn missing_data(&self) -> bool {
        self.null_reason.is_some_and(|r| r.is_missing_data())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub ticker: String,
    pub call_date: NaiveDate,
    pub event_day: Option<NaiveDate>,
    pub returns: Vec<HorizonReturn>,
}

impl ReturnRecord {
    pub fn get(&self, horizon: usize) -> Option<&HorizonReturn> {
        self.returns.iter().find(|r| r.horizon == horizon)
    }

    pub fn value(&self, horizon: usize) -> Option<f64> {
        self.get(horizon).and_then(|r| r.value)
    }
}

// ── Analysis Rows ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRow {
    pub ticker: String,
    pub call_date: NaiveDate,
    pub status: MatchStatus,
    pub features: Option<FeatureRecord>,
    pub returns: Option<ReturnRecord>,
    /// Q&A management word count standardized within the ticker.
    pub qa_management_length_zscore: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_price_series_rejects_unordered_dates() {
        let points = vec![
            PricePoint { date: d(2024, 1, 3), close: 10.0 },
            PricePoint { date: d(2024, 1, 2), close: 11.0 },
        ];
        assert!(PriceSeries::new("AAPL", points).is_err());
    }

    #[test]
    fn test_price_series_rejects_duplicate_dates() {
        let points = vec![
            PricePoint { date: d(2024, 1, 2), close: 10.0 },
            PricePoint { date: d(2024, 1, 2), close: 11.0 },
        ];
        assert!(PriceSeries::new("AAPL", points).is_err());
    }

    #[test]
    fn test_price_series_rejects_non_positive_close() {
        let points = vec![PricePoint { date: d(2024, 1, 2), close: 0.0 }];
        assert!(PriceSeries::new("AAPL", points).is_err());
    }

    #[test]
    fn test_first_on_or_after() {
        let series = PriceSeries::new(
            "aapl",
            vec![
                PricePoint { date: d(2024, 1, 5), close: 10.0 },
                PricePoint { date: d(2024, 1, 8), close: 11.0 },
            ],
        )
        .unwrap();
        assert_eq!(series.ticker(), "AAPL");
        assert_eq!(series.first_on_or_after(d(2024, 1, 5)), Some(0));
        // Saturday call resolves to Monday
        assert_eq!(series.first_on_or_after(d(2024, 1, 6)), Some(1));
        assert_eq!(series.first_on_or_after(d(2024, 1, 9)), None);
    }

    #[test]
    fn test_null_section_has_no_counts() {
        let s = SectionFeatures::null(SectionKind::QAManagement, NullReason::NoQaBoundary);
        let json = serde_json::to_value(&s).unwrap();
        assert!(json["word_count"].is_null());
        assert!(json["chunk_count"].is_null());
    }

    #[test]
    fn test_roster_normalizes_names() {
        let roster = ManagementRoster::new().with_names("mu", &["Sanjay  Mehrotra", "Mark J. Murphy"]);
        assert!(roster.contains("MU", "sanjay mehrotra"));
        assert!(roster.contains("MU", "Mark J Murphy"));
        assert!(!roster.contains("AAPL", "Sanjay Mehrotra"));
        assert_eq!(roster.names_for("MU"), vec!["mark j murphy", "sanjay mehrotra"]);
    }

    #[test]
    fn test_reconstruct_orders_by_span() {
        let utt = |text: &str, start: usize, role: SpeakerRole| Utterance {
            speaker: "X".into(),
            title: None,
            affiliation: None,
            role,
            text: text.into(),
            span: ByteSpan { start, end: start + text.len() },
        };
        let parsed = ParsedTranscript {
            ticker: "MU".into(),
            call_date: d(2024, 1, 2),
            quarter: None,
            sections: vec![
                Section { kind: SectionKind::Presentation, utterances: vec![utt("intro", 0, SpeakerRole::Management)] },
                Section { kind: SectionKind::QAManagement, utterances: vec![utt("answer", 50, SpeakerRole::Management)] },
                Section { kind: SectionKind::QAAnalysts, utterances: vec![utt("question", 20, SpeakerRole::Analyst)] },
            ],
            confidence: ParseConfidence::High,
            boundary_score: Some(1.0),
            stats: ParseStats::default(),
        };
        assert_eq!(parsed.reconstruct(), "intro\nquestion\nanswer");
    }
}
