//! Shared utility functions used across multiple crates.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

// ── Date Parsing ────────────────────────────────────────────────────

/// Parse a date string in `YYYY-MM-DD` format.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parse a date in compact `YYYYMMDD` format.
pub fn parse_date_compact(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

/// Parse the leading date of a price-file cell.
///
/// Accepts `2016-12-21`, `2016-12-21 00:00:00-05:00` and `20161221`; any
/// time or zone suffix is ignored, the exchange-local date is kept.
pub fn parse_price_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    s.get(..10)
        .and_then(parse_date)
        .or_else(|| parse_date(s))
        .or_else(|| parse_date_compact(s))
}

/// Extract the call date from a transcript file name.
///
/// Supported: `2016-Dec-21-MU.txt`, `2016-12-21-MU.txt`, `20161221_MU.txt`.
pub fn parse_call_date_from_filename(name: &str) -> Option<NaiveDate> {
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    let parts: Vec<&str> = stem.split(|c: char| c == '-' || c == '_').collect();
    if parts.len() >= 3 {
        let joined = format!("{}-{}-{}", parts[0], parts[1], parts[2]);
        if let Ok(d) = NaiveDate::parse_from_str(&joined, "%Y-%b-%d") {
            return Some(d);
        }
        if let Some(d) = parse_date(&joined) {
            return Some(d);
        }
    }
    parts.first().and_then(|p| parse_date_compact(p))
}

// ── Normalization ───────────────────────────────────────────────────

pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// Lowercase, drop periods, collapse whitespace: `Mark J.  Murphy` → `mark j murphy`.
pub fn normalize_person_name(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.trim_matches('.').replace('.', "").to_lowercase())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Content Hashing ─────────────────────────────────────────────────

/// SHA-256 over length-prefixed parts, hex encoded.
///
/// Length prefixes keep `["ab", "c"]` and `["a", "bc"]` distinct.
pub fn content_key<S: AsRef<[u8]>>(parts: &[S]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        let bytes = part.as_ref();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    format!("{:x}", hasher.finalize())
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2024-01-15").is_some());
        assert!(parse_date("bad").is_none());
    }

    #[test]
    fn test_parse_date_compact() {
        let d = parse_date_compact("20240115").unwrap();
        assert_eq!(d.to_string(), "2024-01-15");
    }

    #[test]
    fn test_parse_price_date_with_zone() {
        let d = parse_price_date("2016-12-21 00:00:00-05:00").unwrap();
        assert_eq!(d.to_string(), "2016-12-21");
        assert_eq!(parse_price_date("20161221").unwrap().to_string(), "2016-12-21");
        assert!(parse_price_date("Dec 21").is_none());
    }

    #[test]
    fn test_call_date_from_filename() {
        let d = parse_call_date_from_filename("2016-Dec-21-MU.txt").unwrap();
        assert_eq!(d.to_string(), "2016-12-21");
        let d = parse_call_date_from_filename("2023-06-28-MU.txt").unwrap();
        assert_eq!(d.to_string(), "2023-06-28");
        let d = parse_call_date_from_filename("20230628_MU.txt").unwrap();
        assert_eq!(d.to_string(), "2023-06-28");
        assert!(parse_call_date_from_filename("notes.txt").is_none());
    }

    #[test]
    fn test_normalize_person_name() {
        assert_eq!(normalize_person_name("  Mark J.  Murphy "), "mark j murphy");
        assert_eq!(normalize_person_name("SANJAY MEHROTRA"), "sanjay mehrotra");
    }

    #[test]
    fn test_content_key_is_prefix_safe() {
        assert_ne!(content_key(&["ab", "c"]), content_key(&["a", "bc"]));
        assert_eq!(content_key(&["x"]), content_key(&["x"]));
        assert_eq!(content_key(&["x"]).len(), 64);
    }
}
