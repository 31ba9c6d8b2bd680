use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use earnings_core::utils::normalize_ticker;
use earnings_core::{AnalysisRow, FeatureRecord, MatchStatus, ReturnRecord, SectionKind};

type JoinKey = (String, NaiveDate);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblySummary {
    pub rows: usize,
    pub matched: usize,
    pub features_only: usize,
    pub returns_only: usize,
    pub duplicate_features: usize,
    pub duplicate_returns: usize,
}

#[derive(Debug, Clone)]
pub struct Assembly {
    pub rows: Vec<AnalysisRow>,
    pub summary: AssemblySummary,
}

/// Full outer join of feature and return records on (ticker, call date).
#[derive(Debug, Clone, Default)]
pub struct DatasetAssembler;

impl DatasetAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(&self, features: Vec<FeatureRecord>, returns: Vec<ReturnRecord>) -> Assembly {
        let mut summary = AssemblySummary::default();

        let mut by_key: BTreeMap<JoinKey, (Option<FeatureRecord>, Option<ReturnRecord>)> = BTreeMap::new();
        for record in features {
            let key = (normalize_ticker(&record.ticker), record.call_date);
            let slot = by_key.entry(key).or_default();
            if slot.0.is_some() {
                warn!("Duplicate feature record for {} {}, keeping the first", record.ticker, record.call_date);
                summary.duplicate_features += 1;
            } else {
                slot.0 = Some(record);
            }
        }
        for record in returns {
            let key = (normalize_ticker(&record.ticker), record.call_date);
            let slot = by_key.entry(key).or_default();
            if slot.1.is_some() {
                warn!("Duplicate return record for {} {}, keeping the first", record.ticker, record.call_date);
                summary.duplicate_returns += 1;
            } else {
                slot.1 = Some(record);
            }
        }

        let zscores = qa_management_zscores(&by_key);

        let rows: Vec<AnalysisRow> = by_key
            .into_iter()
            .map(|((ticker, call_date), (features, returns))| {
                let status = match (&features, &returns) {
                    (Some(_), Some(_)) => MatchStatus::Matched,
                    (Some(_), None) => MatchStatus::FeaturesOnly,
                    _ => MatchStatus::ReturnsOnly,
                };
                match status {
                    MatchStatus::Matched => summary.matched += 1,
                    MatchStatus::FeaturesOnly => summary.features_only += 1,
                    MatchStatus::ReturnsOnly => summary.returns_only += 1,
                }
                let zscore = zscores.get(&(ticker.clone(), call_date)).copied();
                AnalysisRow {
                    ticker,
                    call_date,
                    status,
                    features,
                    returns,
                    qa_management_length_zscore: zscore,
                }
            })
            .collect();
        summary.rows = rows.len();

        info!(
            "📊 Assembled {} rows: {} matched, {} features-only, {} returns-only",
            summary.rows, summary.matched, summary.features_only, summary.returns_only
        );
        Assembly { rows, summary }
    }
}

/// Q&A management word count standardized per ticker with the sample
/// standard deviation; 0 when the deviation is zero or undefined.
/// Calls whose management section is null take no part and get no score.
fn qa_management_zscores(
    by_key: &BTreeMap<JoinKey, (Option<FeatureRecord>, Option<ReturnRecord>)>,
) -> HashMap<JoinKey, f64> {
    let mut per_ticker: BTreeMap<&str, Vec<(&JoinKey, f64)>> = BTreeMap::new();
    for (key, (features, _)) in by_key {
        if let Some(record) = features {
            let words = record
                .section(SectionKind::QAManagement)
                .filter(|s| s.null_reason.is_none())
                .and_then(|s| s.word_count);
            if let Some(words) = words {
                per_ticker.entry(key.0.as_str()).or_default().push((key, words as f64));
            }
        }
    }

    let mut out = HashMap::new();
    for values in per_ticker.values() {
        let n = values.len() as f64;
        let mean = values.iter().map(|(_, v)| v).sum::<f64>() / n;
        let std = if values.len() > 1 {
            let var = values.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };
        for (key, v) in values {
            let z = if std > 0.0 { (v - mean) / std } else { 0.0 };
            out.insert((*key).clone(), z);
        }
    }
    out
}
