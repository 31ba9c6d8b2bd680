//! Earnings call transcript parsing.
//!
//! Splits raw transcript text into the prepared presentation and the
//! question-and-answer session, the latter split again by speaker role.

pub mod lines;
pub mod metadata;
pub mod parser;
pub mod speaker;

pub use parser::{ParserOptions, TranscriptParser, PARSER_VERSION};
