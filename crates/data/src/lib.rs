//! Corpus discovery, price files, market-data fetch and the artifact cache.

pub mod cache;
pub mod corpus;
pub mod fetch;
pub mod prices;

pub use cache::{ArtifactKind, ArtifactStore};
pub use corpus::{load_roster, parse_roster, Corpus, CorpusEntry};
pub use fetch::{download_prices, FetchSummary, HttpPriceSource, ResilientSource, RetryPolicy};
pub use prices::{load_price_csv, price_path, save_price_csv, CsvPriceSource};
