//! Line-level classification: rules, section headers, boilerplate, Q&A markers.

use std::sync::OnceLock;

use regex_lite::Regex;

/// One source line without its terminator, with byte offsets into the text.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

pub(crate) fn split_lines(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in text.split_inclusive('\n') {
        let body = raw.trim_end_matches(&['\n', '\r'][..]);
        lines.push(Line {
            text: body,
            start: offset,
            end: offset + body.len(),
        });
        offset += raw.len();
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RuleKind {
    /// `-----`, separates speaker blocks.
    Speaker,
    /// `=====` and other rules, separate sections.
    Section,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionHeader {
    Presentation,
    QuestionsAndAnswers,
    /// Definitions / disclaimer tail; content ends here.
    Disclaimer,
}

/// How a Q&A boundary was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Header,
    Phrase,
}

impl BoundaryKind {
    pub fn score(&self) -> f64 {
        match self {
            BoundaryKind::Header => 1.0,
            BoundaryKind::Phrase => 0.6,
        }
    }
}

const QA_PHRASES: &[&str] = &[
    "question-and-answer session",
    "question and answer session",
    "q&a session",
    "q&a portion",
    "open the floor for questions",
    "open the line for questions",
    "open it up for questions",
    "open up the call for questions",
    "we will now take questions",
    "we'll now take questions",
    "begin the question",
];

const VENDOR_FOOTERS: &[&str] = &["thomson reuters", "refinitiv", "copyright", "©"];

fn rule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([=\-_*~])[=\-_*~]{2,}\s*$").expect("rule pattern"))
}

fn presentation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(presentation|prepared remarks|management'?s? (prepared )?remarks)\s*:?$")
            .expect("presentation pattern")
    })
}

fn qa_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(q\s*&\s*a|q\s+and\s+a|questions?[\s-]*(and|&)[\s-]*answers?)(\s+session)?\s*:?$")
            .expect("q&a header pattern")
    })
}

fn disclaimer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(definitions|disclaimer)\s*:?$").expect("disclaimer pattern"))
}

fn page_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(\d{1,4}|page\s+\d+(\s+of\s+\d+)?)$").expect("page pattern"))
}

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[\[(]?\d{1,2}:\d{2}(:\d{2})?[\])]?$").expect("timestamp pattern")
    })
}

fn leading_timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[\[(]\d{1,2}:\d{2}(:\d{2})?[\])]\s*").expect("leading timestamp pattern")
    })
}

pub(crate) fn rule_kind(line: &str) -> Option<RuleKind> {
    let caps = rule_re().captures(line)?;
    match caps.get(1).map(|m| m.as_str()) {
        Some("-") => Some(RuleKind::Speaker),
        _ => Some(RuleKind::Section),
    }
}

pub fn section_header(line: &str) -> Option<SectionHeader> {
    let line = line.trim();
    if qa_header_re().is_match(line) {
        Some(SectionHeader::QuestionsAndAnswers)
    } else if presentation_re().is_match(line) {
        Some(SectionHeader::Presentation)
    } else if disclaimer_re().is_match(line) {
        Some(SectionHeader::Disclaimer)
    } else {
        None
    }
}

/// Page numbers, vendor footers and bare timestamps.
pub(crate) fn is_boilerplate(line: &str) -> bool {
    let line = line.trim();
    if page_re().is_match(line) || timestamp_re().is_match(line) {
        return true;
    }
    let lower = line.to_lowercase();
    VENDOR_FOOTERS.iter().any(|f| lower.starts_with(f))
}

/// Drop a leading `[hh:mm:ss]` stamp.
pub(crate) fn strip_leading_timestamp(line: &str) -> &str {
    match leading_timestamp_re().find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Moderation phrase announcing the Q&A inside running text.
pub fn contains_qa_phrase(line: &str) -> bool {
    let lower = line.to_lowercase();
    QA_PHRASES.iter().any(|p| lower.contains(p))
}
