//! Section-level linguistic features for parsed earnings calls.

pub mod classifier;
pub mod extractor;
pub mod lexicon;
pub mod text;

pub use classifier::{HttpClassifier, LexiconClassifier};
pub use extractor::{FeatureExtractor, WeightedMean};
pub use lexicon::{Lexicons, WordList};
