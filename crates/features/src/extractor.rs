//! Per-section sentiment, uncertainty and forward-looking metrics.

use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use earnings_core::{
    EarningsError, FeatureRecord, NullReason, ParseConfidence, ParsedTranscript, Polarity,
    Result, Section, SectionFeatures, SectionKind, SentimentClassifier,
};

use crate::lexicon::Lexicons;
use crate::text::{pack_chunks, split_sentences, words, Chunk};

/// Bumped whenever tokenizing, chunking or aggregation changes, so cached
/// features are invalidated.
pub const EXTRACTOR_VERSION: &str = "2";

/// Weighted mean kept as `(Σ w·x, Σ w)`. Merging is associative, so
/// per-chunk means combine to the same value in any grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedMean {
    sum: f64,
    weight: f64,
}

impl WeightedMean {
    pub fn of(value: f64, weight: f64) -> Self {
        Self {
            sum: value * weight,
            weight,
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            sum: self.sum + other.sum,
            weight: self.weight + other.weight,
        }
    }

    pub fn value(&self) -> Option<f64> {
        (self.weight > 0.0).then(|| self.sum / self.weight)
    }
}

/// Counts for one non-empty section, before classification.
struct SectionPlan {
    kind: SectionKind,
    word_count: usize,
    uncertainty_hits: usize,
    forward_hits: Option<usize>,
    chunks: Range<usize>,
}

enum Planned {
    Computed(SectionPlan),
    Null(SectionKind, NullReason),
}

/// Turns parsed transcripts into feature records.
///
/// The classifier and word lists are shared handles, loaded once per run.
#[derive(Clone)]
pub struct FeatureExtractor {
    classifier: Arc<dyn SentimentClassifier>,
    lexicons: Arc<Lexicons>,
}

impl FeatureExtractor {
    pub fn new(classifier: Arc<dyn SentimentClassifier>, lexicons: Arc<Lexicons>) -> Self {
        Self {
            classifier,
            lexicons,
        }
    }

    pub fn classifier_label(&self) -> String {
        format!("{}@{}", self.classifier.id(), self.classifier.version())
    }

    /// Everything besides the parse that changes feature output.
    pub fn fingerprint(&self) -> String {
        format!(
            "extractor=v{};classifier={};max_tokens={};uncertainty={};forward_looking={}",
            EXTRACTOR_VERSION,
            self.classifier_label(),
            self.classifier.max_input_tokens(),
            self.lexicons.uncertainty.label(),
            self.lexicons
                .forward_looking
                .as_ref()
                .map(|l| l.label())
                .unwrap_or_else(|| "off".to_string()),
        )
    }

    pub async fn extract(&self, parsed: &ParsedTranscript) -> Result<FeatureRecord> {
        let max_tokens = self.classifier.max_input_tokens().max(1);
        let mut chunks: Vec<Chunk> = Vec::new();
        let plans: Vec<Planned> = SectionKind::ALL
            .iter()
            .map(|&kind| match parsed.section(kind) {
                None => Planned::Null(kind, missing_section_reason(parsed)),
                Some(section) if section.is_empty() => Planned::Null(kind, NullReason::EmptySection),
                Some(section) => Planned::Computed(self.plan(section, max_tokens, &mut chunks)),
            })
            .collect();

        let polarities = self.classify_all(&chunks).await?;

        let sections = plans
            .into_iter()
            .map(|plan| match plan {
                Planned::Null(kind, reason) => SectionFeatures::null(kind, reason),
                Planned::Computed(plan) => aggregate(plan, &chunks, &polarities),
            })
            .collect();

        debug!(
            "{} {}: {} chunks classified by {}",
            parsed.ticker,
            parsed.call_date,
            chunks.len(),
            self.classifier_label()
        );

        Ok(FeatureRecord {
            ticker: parsed.ticker.clone(),
            call_date: parsed.call_date,
            quarter: parsed.quarter.clone(),
            confidence: parsed.confidence,
            classifier: self.classifier_label(),
            uncertainty_list: self.lexicons.uncertainty.label(),
            forward_looking_list: self.lexicons.forward_looking.as_ref().map(|l| l.label()),
            sections,
        })
    }

    fn plan(&self, section: &Section, max_tokens: usize, chunks: &mut Vec<Chunk>) -> SectionPlan {
        let mut tokens: Vec<&str> = Vec::new();
        let mut sentences: Vec<&str> = Vec::new();
        for utterance in &section.utterances {
            tokens.extend(words(&utterance.text));
            sentences.extend(split_sentences(&utterance.text));
        }
        let start = chunks.len();
        chunks.extend(pack_chunks(sentences, max_tokens));
        SectionPlan {
            kind: section.kind,
            word_count: tokens.len(),
            uncertainty_hits: self.lexicons.uncertainty.count_matches(&tokens),
            forward_hits: self
                .lexicons
                .forward_looking
                .as_ref()
                .map(|l| l.count_matches(&tokens)),
            chunks: start..chunks.len(),
        }
    }

    async fn classify_all(&self, chunks: &[Chunk]) -> Result<Vec<Polarity>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.classifier.batch_size().max(1)) {
            let scores = self.classifier.classify(batch).await?;
            if scores.len() != batch.len() {
                return Err(EarningsError::Classifier(format!(
                    "{} returned {} scores for {} chunks",
                    self.classifier_label(),
                    scores.len(),
                    batch.len()
                )));
            }
            out.extend(scores);
        }
        Ok(out)
    }
}

/// Q&A sections are absent only when no boundary was accepted.
fn missing_section_reason(parsed: &ParsedTranscript) -> NullReason {
    match (parsed.confidence, parsed.boundary_score) {
        (ParseConfidence::Low, Some(_)) => NullReason::LowConfidenceParse,
        (ParseConfidence::Low, None) => NullReason::NoQaBoundary,
        (ParseConfidence::High, _) => NullReason::NotComputed,
    }
}

fn aggregate(plan: SectionPlan, chunks: &[Chunk], polarities: &[Polarity]) -> SectionFeatures {
    if plan.word_count == 0 {
        // punctuation or stray symbols only
        return SectionFeatures::null(plan.kind, NullReason::EmptySection);
    }
    let (sentiment, confidence) = plan
        .chunks
        .clone()
        .map(|idx| {
            let weight = chunks[idx].tokens as f64;
            (
                WeightedMean::of(polarities[idx].score, weight),
                WeightedMean::of(polarities[idx].confidence, weight),
            )
        })
        .fold((WeightedMean::default(), WeightedMean::default()), |(s, c), (cs, cc)| {
            (s.merge(cs), c.merge(cc))
        });
    let words = plan.word_count as f64;
    SectionFeatures {
        kind: plan.kind,
        sentiment: sentiment.value().map(|s| s.clamp(-1.0, 1.0)),
        sentiment_confidence: confidence.value().map(|c| c.clamp(0.0, 1.0)),
        uncertainty_ratio: Some(plan.uncertainty_hits as f64 / words),
        forward_looking_ratio: plan.forward_hits.map(|hits| hits as f64 / words),
        word_count: Some(plan.word_count),
        chunk_count: Some(plan.chunks.len()),
        null_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use earnings_core::{ByteSpan, ParseStats, SpeakerRole, Utterance};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::classifier::LexiconClassifier;

    /// Scores every chunk with a fixed polarity and counts calls.
    struct FixedClassifier {
        score: f64,
        max_tokens: usize,
        batch: usize,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn new(score: f64, max_tokens: usize, batch: usize) -> Self {
            Self { score, max_tokens, batch, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl SentimentClassifier for FixedClassifier {
        fn id(&self) -> &str {
            "fixed"
        }
        fn version(&self) -> &str {
            "test"
        }
        fn max_input_tokens(&self) -> usize {
            self.max_tokens
        }
        fn batch_size(&self) -> usize {
            self.batch
        }
        async fn classify(&self, chunks: &[String]) -> Result<Vec<Polarity>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(chunks.iter().map(|_| Polarity::new(self.score, 0.8)).collect())
        }
    }

    /// Returns one score too few.
    struct ShortClassifier;

    #[async_trait]
    impl SentimentClassifier for ShortClassifier {
        fn id(&self) -> &str {
            "short"
        }
        fn version(&self) -> &str {
            "0"
        }
        fn max_input_tokens(&self) -> usize {
            8
        }
        async fn classify(&self, chunks: &[String]) -> Result<Vec<Polarity>> {
            Ok(vec![Polarity::new(0.0, 0.0); chunks.len().saturating_sub(1)])
        }
    }

    fn utterance(role: SpeakerRole, text: &str, at: usize) -> Utterance {
        Utterance {
            speaker: "Speaker".into(),
            title: None,
            affiliation: None,
            role,
            text: text.into(),
            span: ByteSpan { start: at, end: at + text.len() },
        }
    }

    fn parsed(sections: Vec<Section>, confidence: ParseConfidence) -> ParsedTranscript {
        ParsedTranscript {
            ticker: "ACME".into(),
            call_date: NaiveDate::from_ymd_opt(2024, 10, 24).unwrap(),
            quarter: Some("Q3 2024".into()),
            sections,
            confidence,
            boundary_score: None,
            stats: ParseStats::default(),
        }
    }

    fn long_presentation() -> Section {
        let text = "Revenue grew in every segment this quarter. \
                    We may see some volatility in pricing. \
                    Our outlook for next year is unchanged. \
                    Margins will expand as we ramp new capacity. \
                    Inventory levels remain healthy across channels.";
        Section {
            kind: SectionKind::Presentation,
            utterances: vec![utterance(SpeakerRole::Management, text, 0)],
        }
    }

    fn extractor(classifier: Arc<dyn SentimentClassifier>) -> FeatureExtractor {
        FeatureExtractor::new(classifier, Arc::new(Lexicons::default()))
    }

    #[test]
    fn test_weighted_mean_merge() {
        let a = WeightedMean::of(1.0, 3.0);
        let b = WeightedMean::of(-1.0, 1.0);
        let c = WeightedMean::of(0.5, 4.0);
        assert_eq!(a.merge(b).value(), Some(0.5));
        assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
        assert_eq!(a.merge(WeightedMean::default()), a);
        assert_eq!(WeightedMean::default().value(), None);
    }

    #[tokio::test]
    async fn test_uniform_score_is_preserved() {
        let clf = Arc::new(FixedClassifier::new(0.37, 10, 2));
        let record = extractor(clf)
            .extract(&parsed(vec![long_presentation()], ParseConfidence::Low))
            .await
            .unwrap();
        let pres = record.section(SectionKind::Presentation).unwrap();
        assert!(pres.chunk_count.unwrap() > 1);
        assert!((pres.sentiment.unwrap() - 0.37).abs() < 1e-12);
        assert!((pres.sentiment_confidence.unwrap() - 0.8).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_batch_size_does_not_change_features() {
        let transcript = parsed(vec![long_presentation()], ParseConfidence::Low);
        let lexicon = |batch| -> Arc<dyn SentimentClassifier> {
            Arc::new(LexiconClassifier::new("finance-lexicon", "1", 9, batch))
        };
        let one = extractor(lexicon(1)).extract(&transcript).await.unwrap();
        let many = extractor(lexicon(64)).extract(&transcript).await.unwrap();
        assert_eq!(one, many);
    }

    #[tokio::test]
    async fn test_batches_follow_classifier_batch_size() {
        let clf = Arc::new(FixedClassifier::new(0.0, 8, 2));
        let ex = extractor(clf.clone());
        let record = ex.extract(&parsed(vec![long_presentation()], ParseConfidence::Low)).await.unwrap();
        let chunks = record.section(SectionKind::Presentation).unwrap().chunk_count;
        assert_eq!(clf.calls.load(Ordering::SeqCst), chunks.unwrap().div_ceil(2));
    }

    #[tokio::test]
    async fn test_ratios_and_counts() {
        let record = extractor(Arc::new(FixedClassifier::new(0.0, 512, 32)))
            .extract(&parsed(vec![long_presentation()], ParseConfidence::Low))
            .await
            .unwrap();
        let pres = record.section(SectionKind::Presentation).unwrap();
        assert_eq!(pres.word_count, Some(35));
        assert_eq!(pres.chunk_count, Some(1));
        // may, volatility
        assert!((pres.uncertainty_ratio.unwrap() - 2.0 / 35.0).abs() < 1e-12);
        // outlook, will
        assert!((pres.forward_looking_ratio.unwrap() - 2.0 / 35.0).abs() < 1e-12);
        assert!(record.forward_looking_list.is_some());
        assert_eq!(record.classifier, "fixed@test");
    }

    #[tokio::test]
    async fn test_empty_and_missing_sections_are_null() {
        let empty_qa = Section {
            kind: SectionKind::QAManagement,
            utterances: vec![],
        };
        let analysts = Section {
            kind: SectionKind::QAAnalysts,
            utterances: vec![utterance(SpeakerRole::Analyst, "Could you quantify the risk?", 500)],
        };
        let high = parsed(vec![long_presentation(), empty_qa, analysts], ParseConfidence::High);
        let record = extractor(Arc::new(FixedClassifier::new(0.1, 512, 32))).extract(&high).await.unwrap();

        let mgmt = record.section(SectionKind::QAManagement).unwrap();
        assert_eq!(mgmt.null_reason, Some(NullReason::EmptySection));
        assert_eq!(mgmt.uncertainty_ratio, None);
        assert_eq!(mgmt.sentiment, None);
        assert_eq!(mgmt.word_count, None);
        assert_eq!(mgmt.chunk_count, None);

        let analysts = record.section(SectionKind::QAAnalysts).unwrap();
        assert!((analysts.uncertainty_ratio.unwrap() - 0.4).abs() < 1e-12);

        let low = parsed(vec![long_presentation()], ParseConfidence::Low);
        let record = extractor(Arc::new(FixedClassifier::new(0.1, 512, 32))).extract(&low).await.unwrap();
        assert_eq!(record.sections.len(), 3);
        assert_eq!(
            record.section(SectionKind::QAAnalysts).unwrap().null_reason,
            Some(NullReason::NoQaBoundary)
        );
    }

    #[tokio::test]
    async fn test_short_classifier_response_is_an_error() {
        let err = extractor(Arc::new(ShortClassifier))
            .extract(&parsed(vec![long_presentation()], ParseConfidence::Low))
            .await
            .unwrap_err();
        assert!(matches!(err, EarningsError::Classifier(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_fingerprint_tracks_word_lists() {
        let clf: Arc<dyn SentimentClassifier> = Arc::new(LexiconClassifier::default());
        let a = FeatureExtractor::new(clf.clone(), Arc::new(Lexicons::default()));
        let b = FeatureExtractor::new(
            clf,
            Arc::new(Lexicons {
                uncertainty: crate::lexicon::WordList::new("uncertainty", ["risk"]).unwrap(),
                forward_looking: None,
            }),
        );
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
