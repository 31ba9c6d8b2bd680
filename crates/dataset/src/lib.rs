//! Joins feature and return records into the analysis table.

pub mod assembler;
pub mod export;

pub use assembler::{Assembly, AssemblySummary, DatasetAssembler};
pub use export::{read_jsonl, write_analysis_csv, write_jsonl};
