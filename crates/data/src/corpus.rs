//! Transcript corpus discovery and management rosters.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use earnings_core::utils::{normalize_ticker, parse_call_date_from_filename};
use earnings_core::{EarningsError, ManagementRoster, Result, Transcript};

/// One transcript file: `<root>/<TICKER>/<YYYY-Mon-DD>-<TICKER>.txt`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CorpusEntry {
    pub ticker: String,
    pub call_date: NaiveDate,
    pub path: PathBuf,
}

impl CorpusEntry {
    pub fn load(&self) -> Result<Transcript> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| EarningsError::Data(format!("{}: {}", self.path.display(), e)))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Transcript::new(&self.ticker, self.call_date, text).with_source(self.path.clone()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    /// Sorted by ticker, call date, path.
    pub entries: Vec<CorpusEntry>,
    /// `.txt` files whose names carry no recognizable date.
    pub skipped: Vec<PathBuf>,
}

impl Corpus {
    /// Scan `root` for per-ticker transcript directories.
    pub fn discover(root: &Path) -> Result<Self> {
        let dirs = std::fs::read_dir(root).map_err(|e| {
            EarningsError::InputUnavailable(format!("transcripts dir {}: {}", root.display(), e))
        })?;

        let mut corpus = Corpus::default();
        for dir in dirs {
            let dir = dir?;
            if !dir.file_type()?.is_dir() {
                continue;
            }
            let ticker = normalize_ticker(&dir.file_name().to_string_lossy());
            let mut files = Vec::new();
            for file in std::fs::read_dir(dir.path())? {
                files.push(file?.path());
            }
            for path in files {
                if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                    continue;
                }
                let name = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
                match parse_call_date_from_filename(&name) {
                    Some(call_date) => corpus.entries.push(CorpusEntry {
                        ticker: ticker.clone(),
                        call_date,
                        path,
                    }),
                    None => {
                        debug!("No call date in {}, skipping", path.display());
                        corpus.skipped.push(path);
                    }
                }
            }
        }
        corpus.entries.sort();
        corpus.skipped.sort();

        info!(
            "📂 Found {} transcripts for {} tickers in {} ({} skipped)",
            corpus.entries.len(),
            corpus.tickers().len(),
            root.display(),
            corpus.skipped.len()
        );
        Ok(corpus)
    }

    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.entries.iter().map(|e| e.ticker.clone()).collect();
        tickers.dedup();
        tickers
    }

    /// Call dates per ticker.
    pub fn calls_by_ticker(&self) -> BTreeMap<String, Vec<NaiveDate>> {
        let mut out: BTreeMap<String, Vec<NaiveDate>> = BTreeMap::new();
        for entry in &self.entries {
            out.entry(entry.ticker.clone()).or_default().push(entry.call_date);
        }
        out
    }
}

/// Roster file: `TICKER = ["Name", ...]`.
pub fn load_roster(path: &Path) -> Result<ManagementRoster> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| EarningsError::InputUnavailable(format!("roster {}: {}", path.display(), e)))?;
    parse_roster(&content)
        .map_err(|e| EarningsError::Config(format!("roster {}: {}", path.display(), e)))
}

pub fn parse_roster(content: &str) -> std::result::Result<ManagementRoster, toml::de::Error> {
    let table: BTreeMap<String, Vec<String>> = toml::from_str(content)?;
    let mut roster = ManagementRoster::new();
    for (ticker, names) in &table {
        if names.is_empty() {
            warn!("Roster entry for {} has no names", ticker);
        }
        for name in names {
            roster.insert(ticker, name);
        }
    }
    Ok(roster)
}
