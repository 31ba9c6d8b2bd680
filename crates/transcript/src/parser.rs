//! Transcript segmentation into presentation and role-split Q&A sections.

use serde::{Deserialize, Serialize};
use tracing::debug;

use earnings_core::{
    ByteSpan, ManagementRoster, ParseConfidence, ParseStats, ParsedTranscript, Section,
    SectionKind, SpeakerRole, Transcript, Utterance,
};

use crate::lines::{
    contains_qa_phrase, is_boilerplate, rule_kind, section_header, split_lines,
    strip_leading_timestamp, BoundaryKind, Line, RuleKind, SectionHeader,
};
use crate::metadata::extract_quarter;
use crate::speaker::{
    classify_role, is_operator, looks_like_block_speaker, parse_block, parse_inline, SpeakerLine,
};

/// Bumped whenever parsing rules change, so cached parses are invalidated.
pub const PARSER_VERSION: &str = "2";

/// Speaker name given to presentation text in transcripts without attributions.
pub const UNATTRIBUTED_SPEAKER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserOptions {
    pub min_boundary_confidence: f64,
    pub infer_management_from_title: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            min_boundary_confidence: 0.5,
            infer_management_from_title: true,
        }
    }
}

impl ParserOptions {
    /// Stable description of everything that changes parse output.
    pub fn fingerprint(&self) -> String {
        format!(
            "parser=v{};min_boundary={};title_inference={}",
            PARSER_VERSION, self.min_boundary_confidence, self.infer_management_from_title
        )
    }
}

/// Detected Q&A boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub line: usize,
    pub kind: BoundaryKind,
}

impl Boundary {
    pub fn score(&self) -> f64 {
        self.kind.score()
    }
}

#[derive(Debug, Clone)]
enum LineKind<'a> {
    Blank,
    Rule,
    Header(SectionHeader),
    Boilerplate,
    Speaker(SpeakerLine),
    Content(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    /// Title page, participant lists: stripped.
    Preamble,
    Presentation,
    Qa,
}

/// Utterance being accumulated.
struct OpenUtterance {
    speaker: SpeakerLine,
    role: SpeakerRole,
    region: Region,
    lines: Vec<String>,
    start: usize,
    end: usize,
}

impl OpenUtterance {
    fn new(speaker: SpeakerLine, role: SpeakerRole, region: Region, line: &Line<'_>) -> Self {
        Self {
            speaker,
            role,
            region,
            lines: Vec::new(),
            start: line.start,
            end: line.end,
        }
    }

    fn push(&mut self, text: &str, line: &Line<'_>) {
        self.lines.push(text.to_string());
        self.end = line.end;
    }
}

/// Output buckets plus counters.
#[derive(Default)]
struct Segments {
    presentation: Vec<Utterance>,
    qa_management: Vec<Utterance>,
    qa_analysts: Vec<Utterance>,
    stats: ParseStats,
}

impl Segments {
    fn flush(&mut self, open: Option<OpenUtterance>) {
        let Some(open) = open else { return };
        if open.role == SpeakerRole::Operator {
            self.stats.operator_utterances += 1;
            return;
        }
        if open.lines.is_empty() {
            // speaker header with nothing said
            self.stats.skipped_regions += 1;
            return;
        }
        let utterance = Utterance {
            speaker: open.speaker.name,
            title: open.speaker.title,
            affiliation: open.speaker.affiliation,
            role: open.role,
            text: open.lines.join("\n"),
            span: ByteSpan {
                start: open.start,
                end: open.end,
            },
        };
        match (open.region, open.role) {
            (Region::Qa, SpeakerRole::Management) => self.qa_management.push(utterance),
            (Region::Qa, _) => self.qa_analysts.push(utterance),
            _ => self.presentation.push(utterance),
        }
    }
}

/// Parser for earnings call transcripts.
///
/// Output is a pure function of the transcript, the roster and the options.
#[derive(Debug, Clone, Default)]
pub struct TranscriptParser {
    options: ParserOptions,
}

impl TranscriptParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn parse(&self, transcript: &Transcript, roster: &ManagementRoster) -> ParsedTranscript {
        let lines = split_lines(&transcript.text);
        let kinds = classify_lines(&lines);
        let quarter = extract_quarter(lines.iter().map(|l| l.text));

        let boundary = detect_boundary(&kinds);
        let accepted = boundary.filter(|b| b.score() >= self.options.min_boundary_confidence);

        let has_presentation_header = kinds
            .iter()
            .any(|k| matches!(k, LineKind::Header(SectionHeader::Presentation)));
        let has_speakers = kinds.iter().any(|k| matches!(k, LineKind::Speaker(_)));

        let mut region = if has_presentation_header || has_speakers {
            Region::Preamble
        } else {
            Region::Presentation
        };
        let mut segments = Segments::default();
        let mut open: Option<OpenUtterance> = None;
        let mut in_skipped_run = false;

        for (idx, (line, kind)) in lines.iter().zip(kinds.into_iter()).enumerate() {
            let at_boundary = accepted.is_some_and(|b| b.line == idx);

            match kind {
                LineKind::Blank => {}
                LineKind::Rule | LineKind::Boilerplate => {
                    segments.stats.boilerplate_lines += 1;
                }
                LineKind::Header(SectionHeader::Disclaimer) => {
                    segments.flush(open.take());
                    let rest = lines[idx..].iter().filter(|l| !l.text.trim().is_empty()).count();
                    segments.stats.boilerplate_lines += rest;
                    break;
                }
                LineKind::Header(header) => {
                    segments.stats.boilerplate_lines += 1;
                    if at_boundary {
                        segments.flush(open.take());
                        region = Region::Qa;
                        in_skipped_run = false;
                    } else if header == SectionHeader::Presentation && region != Region::Qa {
                        segments.flush(open.take());
                        region = Region::Presentation;
                        in_skipped_run = false;
                    }
                }
                LineKind::Speaker(speaker) => {
                    segments.flush(open.take());
                    if region == Region::Preamble && has_presentation_header && !at_boundary {
                        // participant listing ahead of the presentation
                        segments.stats.boilerplate_lines += 1;
                        continue;
                    }
                    if at_boundary {
                        region = Region::Qa;
                    } else if region == Region::Preamble {
                        region = Region::Presentation;
                    }
                    in_skipped_run = false;
                    let role = classify_role(
                        &speaker,
                        &transcript.ticker,
                        roster,
                        self.options.infer_management_from_title,
                    );
                    let rest = speaker.rest.clone();
                    let mut utterance = OpenUtterance::new(speaker, role, region, line);
                    if let Some(rest) = rest {
                        utterance.push(&rest, line);
                    }
                    open = Some(utterance);
                }
                LineKind::Content(text) => {
                    if at_boundary && region != Region::Qa {
                        // moderation phrase mid-utterance: the speaker continues into Q&A
                        region = Region::Qa;
                        if let Some(prev) = open.take() {
                            let continued =
                                OpenUtterance::new(prev.speaker.clone(), prev.role, region, line);
                            segments.flush(Some(prev));
                            open = Some(continued);
                        }
                    }
                    if region == Region::Preamble {
                        segments.stats.boilerplate_lines += 1;
                    } else if let Some(current) = open.as_mut() {
                        current.push(text, line);
                    } else if region == Region::Presentation && !has_speakers {
                        let speaker = SpeakerLine {
                            name: UNATTRIBUTED_SPEAKER.to_string(),
                            affiliation: None,
                            title: None,
                            rest: None,
                        };
                        let mut utterance =
                            OpenUtterance::new(speaker, SpeakerRole::Management, region, line);
                        utterance.push(text, line);
                        open = Some(utterance);
                    } else if !in_skipped_run {
                        debug!(
                            "{} {}: unattributed text at line {} skipped",
                            transcript.ticker,
                            transcript.call_date,
                            idx + 1
                        );
                        segments.stats.skipped_regions += 1;
                        in_skipped_run = true;
                    }
                }
            }
        }
        segments.flush(open.take());

        let Segments {
            presentation,
            qa_management,
            qa_analysts,
            stats,
        } = segments;

        let mut sections = vec![Section {
            kind: SectionKind::Presentation,
            utterances: presentation,
        }];
        let confidence = if accepted.is_some() {
            sections.push(Section {
                kind: SectionKind::QAManagement,
                utterances: qa_management,
            });
            sections.push(Section {
                kind: SectionKind::QAAnalysts,
                utterances: qa_analysts,
            });
            ParseConfidence::High
        } else {
            debug!(
                "{} {}: no Q&A boundary accepted (best score {:?})",
                transcript.ticker,
                transcript.call_date,
                boundary.map(|b| b.score())
            );
            ParseConfidence::Low
        };

        ParsedTranscript {
            ticker: transcript.ticker.clone(),
            call_date: transcript.call_date,
            quarter,
            sections,
            confidence,
            boundary_score: boundary.map(|b| b.score()),
            stats,
        }
    }
}

fn classify_lines<'a>(lines: &[Line<'a>]) -> Vec<LineKind<'a>> {
    let rules: Vec<Option<RuleKind>> = lines.iter().map(|l| rule_kind(l.text.trim())).collect();
    let blank: Vec<bool> = lines.iter().map(|l| l.text.trim().is_empty()).collect();

    // A single line between two `-----` rules.
    let ruled = |idx: usize| {
        let prev = (0..idx).rev().find(|&i| !blank[i]);
        let next = (idx + 1..lines.len()).find(|&i| !blank[i]);
        matches!(prev.and_then(|i| rules[i]), Some(RuleKind::Speaker))
            && matches!(next.and_then(|i| rules[i]), Some(RuleKind::Speaker))
    };

    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let trimmed = line.text.trim();
            if blank[idx] {
                return LineKind::Blank;
            }
            if rules[idx].is_some() {
                return LineKind::Rule;
            }
            if let Some(header) = section_header(trimmed) {
                return LineKind::Header(header);
            }
            if is_boilerplate(trimmed) {
                return LineKind::Boilerplate;
            }
            let text = strip_leading_timestamp(trimmed).trim();
            if text.is_empty() {
                return LineKind::Boilerplate;
            }
            let speaker = if ruled(idx) && looks_like_block_speaker(text) {
                parse_block(text)
            } else {
                parse_inline(text)
            };
            match speaker {
                Some(speaker) => LineKind::Speaker(speaker),
                None => LineKind::Content(text),
            }
        })
        .collect()
}

/// First Q&A header, else the first line containing a Q&A moderation phrase.
/// Phrases in the operator's opening, before anyone else has spoken, do not count.
fn detect_boundary(kinds: &[LineKind<'_>]) -> Option<Boundary> {
    let header = kinds
        .iter()
        .position(|k| matches!(k, LineKind::Header(SectionHeader::QuestionsAndAnswers)));
    if let Some(line) = header {
        return Some(Boundary {
            line,
            kind: BoundaryKind::Header,
        });
    }
    let opening_end = if kinds.iter().any(|k| matches!(k, LineKind::Speaker(_))) {
        kinds
            .iter()
            .position(|k| matches!(k, LineKind::Speaker(sp) if !is_operator(&sp.name)))?
    } else {
        0
    };
    kinds[opening_end..]
        .iter()
        .position(|k| match k {
            LineKind::Content(text) => contains_qa_phrase(text),
            LineKind::Speaker(sp) => sp.rest.as_deref().is_some_and(contains_qa_phrase),
            _ => false,
        })
        .map(|offset| Boundary {
            line: opening_end + offset,
            kind: BoundaryKind::Phrase,
        })
}
