use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpeakerRole {
    Management,
    Analyst,
    Operator,
}

impl fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakerRole::Management => write!(f, "management"),
            SpeakerRole::Analyst => write!(f, "analyst"),
            SpeakerRole::Operator => write!(f, "operator"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    Presentation,
    QAManagement,
    QAAnalysts,
}

impl SectionKind {
    /// All section kinds in transcript order.
    pub const ALL: [SectionKind; 3] = [
        SectionKind::Presentation,
        SectionKind::QAManagement,
        SectionKind::QAAnalysts,
    ];

    /// Column prefix used by the exported table.
    pub fn column_prefix(&self) -> &'static str {
        match self {
            SectionKind::Presentation => "presentation",
            SectionKind::QAManagement => "qa_management",
            SectionKind::QAAnalysts => "qa_analysts",
        }
    }

    pub fn is_qa(&self) -> bool {
        !matches!(self, SectionKind::Presentation)
    }

    /// Q&A section receiving utterances of the given role, if any.
    pub fn for_qa_role(role: SpeakerRole) -> Option<SectionKind> {
        match role {
            SpeakerRole::Management => Some(SectionKind::QAManagement),
            SpeakerRole::Analyst => Some(SectionKind::QAAnalysts),
            SpeakerRole::Operator => None,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_prefix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseConfidence {
    High,
    /// No Q&A boundary was accepted; the whole call is `Presentation`.
    Low,
}

impl fmt::Display for ParseConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseConfidence::High => write!(f, "high"),
            ParseConfidence::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStatus {
    Matched,
    FeaturesOnly,
    ReturnsOnly,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Matched => write!(f, "matched"),
            MatchStatus::FeaturesOnly => write!(f, "features-only"),
            MatchStatus::ReturnsOnly => write!(f, "returns-only"),
        }
    }
}

/// Why a metric is null. Every null field in the output carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullReason {
    EmptySection,
    NoQaBoundary,
    LowConfidenceParse,
    InsufficientTradingDays,
    NoEventDay,
    UnmatchedJoin,
    NotComputed,
}

impl NullReason {
    /// True when the value is null because the price data ran out, as opposed
    /// to never having been computed.
    pub fn is_missing_data(&self) -> bool {
        matches!(self, NullReason::InsufficientTradingDays | NullReason::NoEventDay)
    }
}

impl fmt::Display for NullReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NullReason::EmptySection => "empty_section",
            NullReason::NoQaBoundary => "no_qa_boundary",
            NullReason::LowConfidenceParse => "low_confidence_parse",
            NullReason::InsufficientTradingDays => "insufficient_trading_days",
            NullReason::NoEventDay => "no_event_day",
            NullReason::UnmatchedJoin => "unmatched_join",
            NullReason::NotComputed => "not_computed",
        };
        write!(f, "{}", s)
    }
}
