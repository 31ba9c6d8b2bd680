//! Speaker attribution and role classification.

use std::sync::OnceLock;

use regex_lite::Regex;

use earnings_core::{ManagementRoster, SpeakerRole};

/// A parsed speaker header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerLine {
    pub name: String,
    pub affiliation: Option<String>,
    pub title: Option<String>,
    /// Text following the colon on the same line, if any.
    pub rest: Option<String>,
}

/// Words that start `Label:` lines but never a person's name.
const NON_NAME_WORDS: &[&str] = &[
    "call", "company", "conference", "corporate", "date", "disclaimer", "edited", "event",
    "forward", "note", "page", "participants", "presentation", "q", "revenue", "safe",
    "source", "ticker", "time", "title", "transcript",
];

const MANAGEMENT_TITLE_WORDS: &[&str] = &["ceo", "cfo", "cto", "coo", "cao", "evp", "svp", "vp", "ir"];

const MANAGEMENT_TITLE_PHRASES: &[&str] = &[
    "chief",
    "president",
    "officer",
    "investor relations",
    "counsel",
    "controller",
    "treasurer",
    "chairman",
    "chairwoman",
    "founder",
];

const ANALYST_TITLE_WORDS: &[&str] = &["analyst", "research", "md", "associate"];

fn inline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<name>[A-Z][A-Za-z'.\-]*(?:\s+[A-Z][A-Za-z'.\-]*){0,3})(?:\s*,\s*(?P<aff>[^:\-–—]{1,80}?))?(?:\s+[-–—]\s+(?P<title>[^:]{1,80}?))?\s*:(?:\s+(?P<rest>.*))?$",
        )
        .expect("inline speaker pattern")
    })
}

fn titled_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<name>[A-Z][A-Za-z'.\-]*(?:\s+[A-Z][A-Za-z'.\-]*){1,3})(?:\s*,\s*(?P<aff>[^\-–—]{1,80}?))?\s+[-–—]\s+(?P<title>[^.?!:]{1,80})$",
        )
        .expect("titled speaker pattern")
    })
}

fn block_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\[\d+\]\s*$").expect("block index pattern"))
}

fn clean(s: Option<regex_lite::Match<'_>>) -> Option<String> {
    s.map(|m| m.as_str().trim().to_string()).filter(|s| !s.is_empty())
}

fn looks_like_name(name: &str) -> bool {
    !name.split_whitespace().any(|w| {
        let w = w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        NON_NAME_WORDS.contains(&w.as_str())
    })
}

/// `Name:`, `Name - Title:`, `Name, Firm - Title: text` or a standalone
/// `Name - Title` line.
pub fn parse_inline(line: &str) -> Option<SpeakerLine> {
    let line = line.trim();
    if let Some(caps) = inline_re().captures(line) {
        let name = caps.name("name")?.as_str().trim().to_string();
        if looks_like_name(&name) {
            return Some(SpeakerLine {
                name,
                affiliation: clean(caps.name("aff")),
                title: clean(caps.name("title")),
                rest: clean(caps.name("rest")),
            });
        }
        return None;
    }

    let caps = titled_re().captures(line)?;
    let name = caps.name("name")?.as_str().trim().to_string();
    let title = clean(caps.name("title"))?;
    if !looks_like_name(&name) || title.split_whitespace().count() > 8 {
        return None;
    }
    Some(SpeakerLine {
        name,
        affiliation: clean(caps.name("aff")),
        title: Some(title),
        rest: None,
    })
}

/// Speaker line of a ruled block: `Name, Firm - Title  [3]` or `Operator  [1]`.
pub fn parse_block(line: &str) -> Option<SpeakerLine> {
    let line = block_index_re().replace(line.trim(), "");
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (who, title) = match line.split_once(" - ") {
        Some((who, title)) => (who.trim(), Some(title.trim().to_string())),
        None => (line, None),
    };
    let (name, affiliation) = match who.split_once(',') {
        Some((name, aff)) => (name.trim(), Some(aff.trim().to_string())),
        None => (who, None),
    };
    if name.is_empty() || name.split_whitespace().count() > 6 {
        return None;
    }
    Some(SpeakerLine {
        name: name.to_string(),
        affiliation: affiliation.filter(|s| !s.is_empty()),
        title: title.filter(|s| !s.is_empty()),
        rest: None,
    })
}

/// Ruled blocks hold either a speaker header or a one-line speech.
pub fn looks_like_block_speaker(line: &str) -> bool {
    let line = line.trim();
    if block_index_re().is_match(line) {
        return true;
    }
    line.contains(" - ") && !line.ends_with(|c: char| matches!(c, '.' | '?' | '!'))
}

pub fn is_operator(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("operator")
}

fn title_words(title: &str) -> Vec<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Executive / IR titles. Research titles never count as management.
pub fn is_management_title(title: &str) -> bool {
    let words = title_words(title);
    if words.iter().any(|w| ANALYST_TITLE_WORDS.contains(&w.as_str())) {
        return false;
    }
    if words.iter().any(|w| MANAGEMENT_TITLE_WORDS.contains(&w.as_str())) {
        return true;
    }
    let lower = title.to_lowercase();
    MANAGEMENT_TITLE_PHRASES.iter().any(|p| lower.contains(p))
}

/// Operator by name, management by roster (then by title when enabled),
/// every other speaker is an analyst.
pub fn classify_role(
    speaker: &SpeakerLine,
    ticker: &str,
    roster: &ManagementRoster,
    infer_from_title: bool,
) -> SpeakerRole {
    if is_operator(&speaker.name) {
        return SpeakerRole::Operator;
    }
    if roster.contains(ticker, &speaker.name) {
        return SpeakerRole::Management;
    }
    if infer_from_title && speaker.title.as_deref().is_some_and(is_management_title) {
        return SpeakerRole::Management;
    }
    SpeakerRole::Analyst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_name_colon() {
        let sp = parse_inline("Jane Smith: We had a record quarter.").unwrap();
        assert_eq!(sp.name, "Jane Smith");
        assert_eq!(sp.title, None);
        assert_eq!(sp.rest.as_deref(), Some("We had a record quarter."));
    }

    #[test]
    fn test_inline_name_title_colon() {
        let sp = parse_inline("John Smith - CEO:").unwrap();
        assert_eq!(sp.name, "John Smith");
        assert_eq!(sp.title.as_deref(), Some("CEO"));
        assert_eq!(sp.rest, None);
    }

    #[test]
    fn test_inline_with_affiliation() {
        let sp = parse_inline("Bob Lee, Big Bank Securities - Analyst: Thanks for taking my question.").unwrap();
        assert_eq!(sp.name, "Bob Lee");
        assert_eq!(sp.affiliation.as_deref(), Some("Big Bank Securities"));
        assert_eq!(sp.title.as_deref(), Some("Analyst"));
        assert_eq!(sp.rest.as_deref(), Some("Thanks for taking my question."));
    }

    #[test]
    fn test_titled_line_without_colon() {
        let sp = parse_inline("Sanjay Mehrotra - President and CEO").unwrap();
        assert_eq!(sp.name, "Sanjay Mehrotra");
        assert_eq!(sp.title.as_deref(), Some("President and CEO"));
    }

    #[test]
    fn test_rejects_labels_and_prose() {
        assert!(parse_inline("Event Date: 2016-12-21").is_none());
        assert!(parse_inline("Note: figures are unaudited").is_none());
        assert!(parse_inline("Revenue grew 12% year over year.").is_none());
        assert!(parse_inline("We expect margins to improve - modestly.").is_none());
    }

    #[test]
    fn test_block_speaker() {
        let sp = parse_block("Sanjay Mehrotra, Micron Technology, Inc. - President, CEO & Director  [2]").unwrap();
        assert_eq!(sp.name, "Sanjay Mehrotra");
        assert_eq!(sp.affiliation.as_deref(), Some("Micron Technology, Inc."));
        assert_eq!(sp.title.as_deref(), Some("President, CEO & Director"));

        let op = parse_block("Operator  [1]").unwrap();
        assert!(is_operator(&op.name));
    }

    #[test]
    fn test_block_speaker_vs_speech() {
        assert!(looks_like_block_speaker("Operator  [1]"));
        assert!(looks_like_block_speaker("Christopher Muse, Evercore ISI - Analyst"));
        assert!(!looks_like_block_speaker("Good afternoon, and welcome to the call."));
        assert!(!looks_like_block_speaker("Thanks - great quarter."));
    }

    #[test]
    fn test_management_titles() {
        assert!(is_management_title("President, CEO & Director"));
        assert!(is_management_title("VP of IR"));
        assert!(is_management_title("Senior Vice President and Chief Financial Officer"));
        assert!(!is_management_title("Senior MD & Senior Equity Research Analyst"));
        assert!(!is_management_title("Goldman Sachs"));
    }

    #[test]
    fn test_classify_role() {
        let roster = ManagementRoster::new().with_names("ACME", &["Jane Smith"]);
        let mgmt = parse_inline("Jane Smith: Hello.").unwrap();
        let titled = parse_inline("Mark Murphy - CFO: Hello.").unwrap();
        let analyst = parse_inline("Bob Lee, Big Bank - Analyst: Hi.").unwrap();
        let unknown = parse_inline("Alex Kim: Hi.").unwrap();
        let op = parse_inline("Operator: Next question.").unwrap();

        assert_eq!(classify_role(&mgmt, "ACME", &roster, true), SpeakerRole::Management);
        assert_eq!(classify_role(&titled, "ACME", &roster, true), SpeakerRole::Management);
        assert_eq!(classify_role(&titled, "ACME", &roster, false), SpeakerRole::Analyst);
        assert_eq!(classify_role(&analyst, "ACME", &roster, true), SpeakerRole::Analyst);
        assert_eq!(classify_role(&unknown, "ACME", &roster, true), SpeakerRole::Analyst);
        assert_eq!(classify_role(&op, "ACME", &roster, true), SpeakerRole::Operator);
    }
}
