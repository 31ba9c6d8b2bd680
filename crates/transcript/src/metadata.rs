use std::sync::OnceLock;

use regex_lite::Regex;

/// Lines of the transcript header searched for the fiscal quarter.
pub const QUARTER_SEARCH_LINES: usize = 20;

fn short_quarter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(Q[1-4])\s*(?:FY\s*)?'?(\d{4})\b").expect("short quarter pattern")
    })
}

fn long_quarter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(first|second|third|fourth)\s+quarter\s+(?:of\s+)?(?:fiscal\s+(?:year\s+)?)?(\d{4})\b")
            .expect("long quarter pattern")
    })
}

fn ordinal_to_quarter(word: &str) -> Option<u8> {
    match word.to_lowercase().as_str() {
        "first" => Some(1),
        "second" => Some(2),
        "third" => Some(3),
        "fourth" => Some(4),
        _ => None,
    }
}

/// Fiscal quarter label (`Q3 2024`) from a header line, if present.
pub fn quarter_in_line(line: &str) -> Option<String> {
    if let Some(caps) = short_quarter_re().captures(line) {
        let q = caps.get(1)?.as_str().to_uppercase();
        let year = caps.get(2)?.as_str();
        return Some(format!("{} {}", q, year));
    }
    let caps = long_quarter_re().captures(line)?;
    let q = ordinal_to_quarter(caps.get(1)?.as_str())?;
    let year = caps.get(2)?.as_str();
    Some(format!("Q{} {}", q, year))
}

/// First quarter label found in the transcript header.
pub fn extract_quarter<'a>(lines: impl IntoIterator<Item = &'a str>) -> Option<String> {
    lines
        .into_iter()
        .take(QUARTER_SEARCH_LINES)
        .find_map(quarter_in_line)
}
