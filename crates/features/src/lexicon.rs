//! Term lists for uncertainty and forward-looking language.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::info;

use earnings_core::utils::content_key;
use earnings_core::{EarningsError, Result};

use crate::text::words;

const UNCERTAINTY_TERMS: &[&str] = &[
    "may", "could", "might", "possibly", "perhaps", "uncertain", "risk", "variable",
    "fluctuation", "instability", "approximate", "contingency", "depend", "exposure",
    "indefinite", "volatility",
];

const FORWARD_LOOKING_TERMS: &[&str] = &[
    "will", "expect", "anticipate", "forecast", "outlook", "project", "target", "plan",
    "believe", "intend", "estimate", "future", "goal", "objective", "upcoming",
];

/// A fixed set of lower-cased single-word terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordList {
    name: String,
    terms: BTreeSet<String>,
    version: String,
}

impl WordList {
    pub fn new<I, S>(name: &str, terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: BTreeSet<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return Err(EarningsError::LexiconUnavailable(format!("{}: no terms", name)));
        }
        if let Some(bad) = terms.iter().find(|t| words(t).len() != 1) {
            return Err(EarningsError::LexiconUnavailable(format!(
                "{}: term {:?} is not a single word",
                name, bad
            )));
        }
        let sorted: Vec<&str> = terms.iter().map(String::as_str).collect();
        let version = content_key(&sorted)[..12].to_string();
        Ok(Self {
            name: name.to_string(),
            terms,
            version,
        })
    }

    /// One term per line; blank lines and `#` comments are ignored.
    pub fn from_file(name: &str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EarningsError::LexiconUnavailable(format!("{} ({}): {}", name, path.display(), e))
        })?;
        let list = Self::new(
            name,
            content
                .lines()
                .map(|l| l.split('#').next().unwrap_or("").trim())
                .filter(|l| !l.is_empty()),
        )?;
        info!("📖 Loaded word list {} from {} ({} terms)", name, path.display(), list.len());
        Ok(list)
    }

    pub fn uncertainty() -> Self {
        Self::builtin("uncertainty", UNCERTAINTY_TERMS)
    }

    pub fn forward_looking() -> Self {
        Self::builtin("forward-looking", FORWARD_LOOKING_TERMS)
    }

    fn builtin(name: &str, terms: &[&str]) -> Self {
        let set: BTreeSet<String> = terms.iter().map(|t| t.to_string()).collect();
        let sorted: Vec<&str> = set.iter().map(String::as_str).collect();
        let version = content_key(&sorted)[..12].to_string();
        Self {
            name: name.to_string(),
            terms: set,
            version,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Short SHA-256 of the sorted terms.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// `name@version`, as recorded on feature records.
    pub fn label(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.terms.contains(&word.to_lowercase())
    }

    /// Case-insensitive whole-word matches among `tokens`.
    pub fn count_matches(&self, tokens: &[&str]) -> usize {
        tokens.iter().filter(|w| self.contains(w)).count()
    }
}

/// Word lists used by feature extraction, loaded once per run.
#[derive(Debug, Clone)]
pub struct Lexicons {
    pub uncertainty: WordList,
    pub forward_looking: Option<WordList>,
}

impl Default for Lexicons {
    fn default() -> Self {
        Self {
            uncertainty: WordList::uncertainty(),
            forward_looking: Some(WordList::forward_looking()),
        }
    }
}

impl Lexicons {
    /// File-backed lists where a path is given, built-in lists otherwise.
    pub fn load(
        uncertainty_path: Option<&Path>,
        forward_looking_path: Option<&Path>,
        disable_forward_looking: bool,
    ) -> Result<Self> {
        let uncertainty = match uncertainty_path {
            Some(path) => WordList::from_file("uncertainty", path)?,
            None => WordList::uncertainty(),
        };
        let forward_looking = if disable_forward_looking {
            None
        } else {
            Some(match forward_looking_path {
                Some(path) => WordList::from_file("forward-looking", path)?,
                None => WordList::forward_looking(),
            })
        };
        Ok(Self {
            uncertainty,
            forward_looking,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_lists() {
        let list = WordList::uncertainty();
        assert_eq!(list.len(), 16);
        assert!(list.contains("Risk"));
        assert!(!list.contains("risks"));
        assert_eq!(list.version().len(), 12);
        assert_eq!(WordList::forward_looking().len(), 15);
    }

    #[test]
    fn test_version_ignores_order_and_case() {
        let a = WordList::new("u", ["risk", "may"]).unwrap();
        let b = WordList::new("u", ["MAY", " risk "]).unwrap();
        let c = WordList::new("u", ["risk", "may", "could"]).unwrap();
        assert_eq!(a.version(), b.version());
        assert_ne!(a.version(), c.version());
    }

    #[test]
    fn test_count_whole_words() {
        let list = WordList::uncertainty();
        let tokens = words("Maybe we may see risk; risky volatility MAY persist.");
        assert_eq!(list.count_matches(&tokens), 4);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# custom list\nrisk\n\nheadwind  # macro\n").unwrap();
        let list = WordList::from_file("uncertainty", file.path()).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains("headwind"));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = WordList::from_file("uncertainty", "/nonexistent/words.txt").unwrap_err();
        assert!(err.is_fatal());
        let err = WordList::new("empty", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, EarningsError::LexiconUnavailable(_)));
    }

    #[test]
    fn test_lexicons_disable_forward_looking() {
        let lex = Lexicons::load(None, None, true).unwrap();
        assert!(lex.forward_looking.is_none());
        assert_eq!(lex.uncertainty.name(), "uncertainty");
    }
}
