pub mod error;
pub mod models;
pub mod traits;
pub mod types;
pub mod utils;

pub use error::{EarningsError, Result};
pub use models::{
    AnalysisRow, ByteSpan, FeatureRecord, HorizonReturn, ManagementRoster, ParseStats,
    ParsedTranscript, PricePoint, PriceSeries, ReturnRecord, Section, SectionFeatures,
    Transcript, Utterance,
};
pub use traits::{Polarity, PriceSource, SentimentClassifier};
pub use types::{MatchStatus, NullReason, ParseConfidence, SectionKind, SpeakerRole};
