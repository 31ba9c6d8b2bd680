//! JSONL artifacts and the final analysis CSV.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use csv::Writer;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use earnings_core::{AnalysisRow, EarningsError, NullReason, Result, SectionKind};

/// One JSON document per line.
pub fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut out, item)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    info!("💾 Wrote {} records to {}", items.len(), path.display());
    Ok(())
}

pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .map_err(|e| EarningsError::InputUnavailable(format!("{}: {}", path.display(), e)))?;
    let mut items = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line)
            .map_err(|e| EarningsError::Data(format!("{}:{}: {}", path.display(), idx + 1, e)))?;
        items.push(item);
    }
    Ok(items)
}

const SECTION_COLUMNS: &[&str] = &[
    "sentiment",
    "sentiment_confidence",
    "uncertainty_ratio",
    "forward_looking_ratio",
    "word_count",
    "chunk_count",
    "null_reason",
];

/// Column names of the analysis table for the given horizons.
pub fn analysis_header(horizons: &[usize]) -> Vec<String> {
    let mut header: Vec<String> = [
        "ticker",
        "call_date",
        "match_status",
        "quarter",
        "parse_confidence",
        "classifier",
        "uncertainty_list",
        "forward_looking_list",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for kind in SectionKind::ALL {
        for col in SECTION_COLUMNS {
            header.push(format!("{}_{}", kind.column_prefix(), col));
        }
    }
    header.push("qa_management_length_zscore".to_string());
    header.push("event_day".to_string());
    for h in horizons {
        header.push(format!("ret_{}d", h));
        header.push(format!("ret_{}d_null_reason", h));
    }
    header
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Cells of one analysis row, aligned with [`analysis_header`].
pub fn analysis_record(row: &AnalysisRow, horizons: &[usize]) -> Vec<String> {
    let unmatched = NullReason::UnmatchedJoin.to_string();
    let mut record = vec![row.ticker.clone(), row.call_date.to_string(), row.status.to_string()];

    match &row.features {
        Some(f) => {
            record.push(opt(f.quarter.as_ref()));
            record.push(f.confidence.to_string());
            record.push(f.classifier.clone());
            record.push(f.uncertainty_list.clone());
            record.push(opt(f.forward_looking_list.as_ref()));
            for kind in SectionKind::ALL {
                match f.section(kind) {
                    Some(s) => {
                        record.push(opt(s.sentiment));
                        record.push(opt(s.sentiment_confidence));
                        record.push(opt(s.uncertainty_ratio));
                        record.push(opt(s.forward_looking_ratio));
                        record.push(opt(s.word_count));
                        record.push(opt(s.chunk_count));
                        record.push(opt(s.null_reason));
                    }
                    None => {
                        record.extend(std::iter::repeat(String::new()).take(SECTION_COLUMNS.len() - 1));
                        record.push(NullReason::NotComputed.to_string());
                    }
                }
            }
        }
        None => {
            record.extend(std::iter::repeat(String::new()).take(5));
            for _ in SectionKind::ALL {
                record.extend(std::iter::repeat(String::new()).take(SECTION_COLUMNS.len() - 1));
                record.push(unmatched.clone());
            }
        }
    }

    record.push(opt(row.qa_management_length_zscore));

    match &row.returns {
        Some(r) => {
            record.push(opt(r.event_day));
            for &h in horizons {
                match r.get(h) {
                    Some(ret) => {
                        record.push(opt(ret.value));
                        record.push(opt(ret.null_reason));
                    }
                    None => {
                        record.push(String::new());
                        record.push(NullReason::NotComputed.to_string());
                    }
                }
            }
        }
        None => {
            record.push(String::new());
            for _ in horizons {
                record.push(String::new());
                record.push(unmatched.clone());
            }
        }
    }
    record
}

pub fn write_analysis_csv(path: &Path, rows: &[AnalysisRow], horizons: &[usize]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = Writer::from_path(path)?;
    writer.write_record(analysis_header(horizons))?;
    for row in rows {
        writer.write_record(analysis_record(row, horizons))?;
    }
    writer.flush()?;
    info!("💾 Wrote {} analysis rows to {}", rows.len(), path.display());
    Ok(())
}
