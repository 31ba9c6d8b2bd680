//! Per-ticker daily close files (`<dir>/<TICKER>.csv`, `Date` and `Close` columns).

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::{Reader, Writer};
use tracing::debug;

use earnings_core::utils::{normalize_ticker, parse_price_date};
use earnings_core::{EarningsError, PricePoint, PriceSeries, PriceSource, Result};

pub fn price_path(dir: &Path, ticker: &str) -> PathBuf {
    dir.join(format!("{}.csv", normalize_ticker(ticker)))
}

/// Read a price file. Rows with an unparseable date or a missing, NaN or
/// non-positive close are dropped; for repeated dates the first row wins.
pub fn load_price_csv(path: &Path, ticker: &str) -> Result<PriceSeries> {
    let file = File::open(path)
        .map_err(|e| EarningsError::Price(format!("{}: {}", path.display(), e)))?;
    let mut reader = Reader::from_reader(file);

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| EarningsError::Price(format!("{}: no {} column", path.display(), name)))
    };
    let date_col = column("date")?;
    let close_col = column("close")?;

    let mut points = Vec::new();
    let mut dropped = 0usize;
    for record in reader.records() {
        let record = record?;
        let date = record.get(date_col).and_then(parse_price_date);
        let close = record
            .get(close_col)
            .and_then(|c| c.trim().parse::<f64>().ok())
            .filter(|c| c.is_finite() && *c > 0.0);
        match (date, close) {
            (Some(date), Some(close)) => points.push(PricePoint { date, close }),
            _ => dropped += 1,
        }
    }
    points.sort_by_key(|p| p.date);
    let before = points.len();
    points.dedup_by_key(|p| p.date);
    dropped += before - points.len();
    if dropped > 0 {
        debug!("{}: dropped {} unusable price rows", path.display(), dropped);
    }
    PriceSeries::new(ticker, points)
}

pub fn save_price_csv(path: &Path, series: &PriceSeries) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["Date", "Close"])?;
    for p in series.points() {
        writer.write_record([p.date.to_string(), p.close.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Price files already on disk.
pub struct CsvPriceSource {
    dir: PathBuf,
}

impl CsvPriceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn has(&self, ticker: &str) -> bool {
        price_path(&self.dir, ticker).is_file()
    }
}

#[async_trait]
impl PriceSource for CsvPriceSource {
    fn name(&self) -> &str {
        "csv"
    }

    async fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries> {
        load_price_csv(&price_path(&self.dir, ticker), ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_load_yfinance_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MU.csv");
        std::fs::write(
            &path,
            "Date,Open,High,Low,Close,Volume\n\
             2016-12-22 00:00:00-05:00,21.1,21.9,20.8,21.5,1000\n\
             2016-12-21 00:00:00-05:00,20.0,20.5,19.9,20.2,1000\n\
             2016-12-23 00:00:00-05:00,21.0,21.2,20.9,,1000\n\
             2016-12-22 00:00:00-05:00,1,1,1,99.0,1\n",
        )
        .unwrap();
        let series = load_price_csv(&path, "mu").unwrap();
        assert_eq!(series.ticker(), "MU");
        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[0].date, NaiveDate::from_ymd_opt(2016, 12, 21).unwrap());
        assert_eq!(series.points()[1].close, 21.5);
    }

    #[test]
    fn test_missing_close_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("X.csv");
        std::fs::write(&path, "Date,Open\n2020-01-02,1.0\n").unwrap();
        let err = load_price_csv(&path, "X").unwrap_err();
        assert!(matches!(err, EarningsError::Price(_)));
    }

    #[tokio::test]
    async fn test_save_then_serve() {
        let dir = tempfile::tempdir().unwrap();
        let points = vec![
            PricePoint { date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), close: 10.0 },
            PricePoint { date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), close: 10.5 },
        ];
        let series = PriceSeries::new("ACME", points).unwrap();
        save_price_csv(&price_path(dir.path(), "acme"), &series).unwrap();

        let source = CsvPriceSource::new(dir.path());
        assert!(source.has("ACME"));
        assert!(!source.has("OTHER"));
        let loaded = source.fetch_daily("ACME").await.unwrap();
        assert_eq!(loaded, series);
        assert!(source.fetch_daily("OTHER").await.is_err());
    }
}
