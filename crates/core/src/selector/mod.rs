//! Response selection
//!
//! Turns an utterance into a reply: extract features, classify, gate on
//! confidence, then sample one of the matching intent's responses. Low
//! confidence and tags unknown to the knowledge base are ordinary outcomes
//! that produce [`FALLBACK_MESSAGE`]; only knowledge-base load failures and
//! classifier failures surface as errors.

mod picker;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

pub use picker::{ResponsePicker, SeededPicker, ThreadRngPicker};

use crate::errors::SelectionError;
use crate::knowledge::SharedKnowledgeBase;
use crate::ml::Classifier;
use crate::nlp::FeatureExtractor;

/// User-visible reply when no trusted response is available. Not localized.
pub const FALLBACK_MESSAGE: &str =
    "Sorry, currently my model is not trained to answer this question :(";

/// Probabilities must be strictly greater than this to be trusted.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.65;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionOutcome {
    Matched,
    LowConfidence,
    UnknownTag,
    NoResponses,
    NoPrediction,
}

impl SelectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::LowConfidence => "low_confidence",
            Self::UnknownTag => "unknown_tag",
            Self::NoResponses => "no_responses",
            Self::NoPrediction => "no_prediction",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub reply: String,
    pub tag: Option<String>,
    pub probability: Option<f64>,
    pub outcome: SelectionOutcome,
}

impl Selection {
    fn fallback(tag: Option<String>, probability: Option<f64>, outcome: SelectionOutcome) -> Self {
        Self { reply: FALLBACK_MESSAGE.to_string(), tag, probability, outcome }
    }

    pub fn is_fallback(&self) -> bool {
        self.outcome != SelectionOutcome::Matched
    }
}

pub struct ResponseSelector {
    knowledge: Arc<SharedKnowledgeBase>,
    extractor: Arc<dyn FeatureExtractor>,
    classifier: Arc<dyn Classifier>,
    picker: Arc<dyn ResponsePicker>,
    confidence_threshold: f64,
}

impl ResponseSelector {
    pub fn new(
        knowledge: Arc<SharedKnowledgeBase>,
        extractor: Arc<dyn FeatureExtractor>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            knowledge,
            extractor,
            classifier,
            picker: Arc::new(ThreadRngPicker),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_picker(mut self, picker: Arc<dyn ResponsePicker>) -> Self {
        self.picker = picker;
        self
    }

    /// Finite values are clamped to `0.0..=1.0`. A non-finite value is
    /// ignored and the current threshold is kept.
    pub fn with_confidence_threshold(mut self, confidence_threshold: f64) -> Self {
        if confidence_threshold.is_finite() {
            self.confidence_threshold = confidence_threshold.clamp(0.0, 1.0);
        } else {
            warn!(
                event_name = "selector.threshold.rejected",
                requested = confidence_threshold,
                kept = self.confidence_threshold,
                "ignoring non-finite confidence threshold"
            );
        }
        self
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn knowledge(&self) -> &Arc<SharedKnowledgeBase> {
        &self.knowledge
    }

    pub fn respond(&self, utterance: &str) -> Result<String, SelectionError> {
        self.select(utterance).map(|selection| selection.reply)
    }

    pub fn select(&self, utterance: &str) -> Result<Selection, SelectionError> {
        let features = self.extractor.extract(utterance);
        let prediction = self.classifier.predict(&features)?;

        let Some(best) = prediction.best() else {
            debug!(event_name = "selector.no_prediction", "classifier returned an empty distribution");
            return Ok(Selection::fallback(None, None, SelectionOutcome::NoPrediction));
        };
        let tag = best.tag.clone();
        let probability = best.probability;

        if probability <= self.confidence_threshold {
            debug!(
                event_name = "selector.low_confidence",
                tag = %tag,
                probability,
                threshold = self.confidence_threshold,
                "classification below confidence threshold"
            );
            return Ok(Selection::fallback(Some(tag), Some(probability), SelectionOutcome::LowConfidence));
        }

        let knowledge = self.knowledge.get_data()?;
        let Some(intent) = knowledge.intent_by_tag(&tag) else {
            warn!(
                event_name = "selector.unknown_tag",
                tag = %tag,
                probability,
                generation = self.knowledge.generation(),
                "classified tag is missing from the knowledge base"
            );
            return Ok(Selection::fallback(Some(tag), Some(probability), SelectionOutcome::UnknownTag));
        };

        match self.picker.pick(&intent.responses) {
            Some(reply) => Ok(Selection {
                reply: reply.to_string(),
                tag: Some(tag),
                probability: Some(probability),
                outcome: SelectionOutcome::Matched,
            }),
            None => {
                warn!(
                    event_name = "selector.no_responses",
                    tag = %tag,
                    "matched intent has no responses"
                );
                Ok(Selection::fallback(Some(tag), Some(probability), SelectionOutcome::NoResponses))
            }
        }
    }
}

impl fmt::Debug for ResponseSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseSelector")
            .field("knowledge", &self.knowledge)
            .field("tags", &self.classifier.tags())
            .field("confidence_threshold", &self.confidence_threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::{
        ResponsePicker, ResponseSelector, SeededPicker, SelectionOutcome, FALLBACK_MESSAGE,
    };
    use crate::errors::{ModelError, SelectionError};
    use crate::knowledge::{SharedKnowledgeBase, StaticSource};
    use crate::ml::{Classifier, Prediction};
    use crate::nlp::FeatureExtractor;

    const SOURCE: &str = r#"{"intents":[{"tag":"greeting","patterns":["hi"],"responses":["Hello!","Hi there!"]}]}"#;

    struct RecordingExtractor {
        seen: Mutex<Vec<String>>,
    }

    impl RecordingExtractor {
        fn new() -> Arc<Self> {
            Arc::new(Self { seen: Mutex::new(Vec::new()) })
        }
    }

    impl FeatureExtractor for RecordingExtractor {
        fn extract(&self, utterance: &str) -> Vec<f32> {
            self.seen.lock().expect("seen lock").push(utterance.to_string());
            vec![utterance.len() as f32]
        }
    }

    struct FixedClassifier {
        tags: Vec<String>,
        prediction: Result<Prediction, String>,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn returning(pairs: &[(&str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                tags: pairs.iter().map(|(tag, _)| tag.to_string()).collect(),
                prediction: Ok(Prediction::from_pairs(pairs.iter().copied())),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                tags: Vec::new(),
                prediction: Err("weights are corrupt".to_string()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Classifier for FixedClassifier {
        fn tags(&self) -> &[String] {
            &self.tags
        }

        fn predict(&self, _features: &[f32]) -> Result<Prediction, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prediction.clone().map_err(ModelError::Shape)
        }
    }

    /// Always returns the candidate at a fixed index.
    struct IndexPicker(usize);

    impl ResponsePicker for IndexPicker {
        fn pick<'a>(&self, responses: &'a [String]) -> Option<&'a str> {
            responses.get(self.0).map(String::as_str)
        }
    }

    fn selector_with(source: &str, classifier: Arc<FixedClassifier>) -> ResponseSelector {
        ResponseSelector::new(
            Arc::new(SharedKnowledgeBase::new(StaticSource::new(source))),
            RecordingExtractor::new(),
            classifier,
        )
    }

    #[test]
    fn confident_known_tag_returns_one_of_its_responses() {
        let selector = selector_with(SOURCE, FixedClassifier::returning(&[("greeting", 0.9)]));

        for _ in 0..20 {
            let reply = selector.respond("hi").expect("respond should succeed");
            assert!(reply == "Hello!" || reply == "Hi there!", "unexpected reply {reply}");
        }
    }

    #[test]
    fn injected_picker_makes_sampling_deterministic() {
        let selector = selector_with(SOURCE, FixedClassifier::returning(&[("greeting", 0.9)]))
            .with_picker(Arc::new(IndexPicker(1)));

        let selection = selector.select("hi").expect("select should succeed");

        assert_eq!(selection.reply, "Hi there!");
        assert_eq!(selection.tag.as_deref(), Some("greeting"));
        assert_eq!(selection.outcome, SelectionOutcome::Matched);
        assert!(!selection.is_fallback());
    }

    #[test]
    fn seeded_selectors_agree() {
        let first = selector_with(SOURCE, FixedClassifier::returning(&[("greeting", 0.9)]))
            .with_picker(Arc::new(SeededPicker::new(99)));
        let second = selector_with(SOURCE, FixedClassifier::returning(&[("greeting", 0.9)]))
            .with_picker(Arc::new(SeededPicker::new(99)));

        for _ in 0..10 {
            assert_eq!(
                first.respond("hi").expect("first reply"),
                second.respond("hi").expect("second reply")
            );
        }
    }

    #[test]
    fn low_confidence_returns_fallback_without_loading_knowledge() {
        let selector = selector_with(SOURCE, FixedClassifier::returning(&[("greeting", 0.5)]));

        let selection = selector.select("hi").expect("select should succeed");

        assert_eq!(selection.reply, FALLBACK_MESSAGE);
        assert_eq!(selection.outcome, SelectionOutcome::LowConfidence);
        assert!(!selector.knowledge().is_loaded());
    }

    #[test]
    fn fallback_path_is_idempotent() {
        let selector = selector_with(SOURCE, FixedClassifier::returning(&[("greeting", 0.3)]));

        let replies: Vec<String> =
            (0..5).map(|_| selector.respond("hm").expect("respond should succeed")).collect();

        assert!(replies.iter().all(|reply| reply == FALLBACK_MESSAGE));
    }

    #[test]
    fn threshold_is_strict() {
        let at_threshold = selector_with(SOURCE, FixedClassifier::returning(&[("greeting", 0.65)]));
        assert_eq!(at_threshold.respond("hi").expect("respond"), FALLBACK_MESSAGE);

        let above = selector_with(SOURCE, FixedClassifier::returning(&[("greeting", 0.650001)]))
            .with_picker(Arc::new(IndexPicker(0)));
        assert_eq!(above.respond("hi").expect("respond"), "Hello!");
    }

    #[test]
    fn configured_threshold_replaces_default() {
        let selector = selector_with(SOURCE, FixedClassifier::returning(&[("greeting", 0.5)]))
            .with_confidence_threshold(0.4)
            .with_picker(Arc::new(IndexPicker(0)));

        assert_eq!(selector.confidence_threshold(), 0.4);
        assert_eq!(selector.respond("hi").expect("respond"), "Hello!");
    }

    #[test]
    fn non_finite_threshold_keeps_gate_closed_for_weak_predictions() {
        let selector = selector_with(SOURCE, FixedClassifier::returning(&[("greeting", 0.5)]))
            .with_confidence_threshold(f64::NAN);

        assert_eq!(selector.confidence_threshold(), 0.65);
        assert_eq!(selector.respond("hi").expect("respond"), FALLBACK_MESSAGE);

        let infinite = selector.with_confidence_threshold(f64::NEG_INFINITY);
        assert_eq!(infinite.confidence_threshold(), 0.65);
    }

    #[test]
    fn out_of_range_threshold_is_clamped() {
        let above = selector_with(SOURCE, FixedClassifier::returning(&[("greeting", 0.99)]))
            .with_confidence_threshold(3.0);
        assert_eq!(above.confidence_threshold(), 1.0);
        assert_eq!(above.respond("hi").expect("respond"), FALLBACK_MESSAGE);

        let below = selector_with(SOURCE, FixedClassifier::returning(&[("greeting", 0.01)]))
            .with_confidence_threshold(-2.0)
            .with_picker(Arc::new(IndexPicker(0)));
        assert_eq!(below.confidence_threshold(), 0.0);
        assert_eq!(below.respond("hi").expect("respond"), "Hello!");
    }

    #[test]
    fn tag_missing_from_knowledge_base_returns_fallback() {
        let selector = selector_with(SOURCE, FixedClassifier::returning(&[("farewell", 0.95)]));

        let selection = selector.select("bye").expect("select should succeed");

        assert_eq!(selection.reply, FALLBACK_MESSAGE);
        assert_eq!(selection.outcome, SelectionOutcome::UnknownTag);
        assert_eq!(selection.tag.as_deref(), Some("farewell"));
    }

    #[test]
    fn ties_resolve_to_first_canonical_tag() {
        let source = r#"{"intents":[
            {"tag":"a","patterns":[],"responses":["from a"]},
            {"tag":"b","patterns":[],"responses":["from b"]}
        ]}"#;
        let selector = selector_with(source, FixedClassifier::returning(&[("b", 0.45), ("a", 0.45), ("c", 0.1)]))
            .with_confidence_threshold(0.4);

        assert_eq!(selector.respond("?").expect("respond"), "from b");
    }

    #[test]
    fn intent_without_responses_returns_fallback() {
        let source = r#"{"intents":[{"tag":"silent","patterns":["shh"],"responses":[]}]}"#;
        let selector = selector_with(source, FixedClassifier::returning(&[("silent", 0.99)]));

        let selection = selector.select("shh").expect("select should succeed");

        assert_eq!(selection.reply, FALLBACK_MESSAGE);
        assert_eq!(selection.outcome, SelectionOutcome::NoResponses);
    }

    #[test]
    fn empty_distribution_returns_fallback() {
        let selector = selector_with(SOURCE, FixedClassifier::returning(&[]));

        let selection = selector.select("hi").expect("select should succeed");

        assert_eq!(selection.outcome, SelectionOutcome::NoPrediction);
        assert!(selection.tag.is_none());
    }

    #[test]
    fn utterance_is_passed_through_unchanged() {
        let extractor = RecordingExtractor::new();
        let selector = ResponseSelector::new(
            Arc::new(SharedKnowledgeBase::new(StaticSource::new(SOURCE))),
            extractor.clone(),
            FixedClassifier::returning(&[("greeting", 0.1)]),
        );

        selector.respond("").expect("respond");
        selector.respond("  Hi?! ").expect("respond");

        assert_eq!(*extractor.seen.lock().expect("seen lock"), vec!["", "  Hi?! "]);
    }

    #[test]
    fn knowledge_base_failure_propagates() {
        let selector = selector_with("{ broken", FixedClassifier::returning(&[("greeting", 0.9)]));

        let error = selector.respond("hi").expect_err("load failure should propagate");

        assert!(matches!(error, SelectionError::KnowledgeBase(_)));
        assert!(!selector.knowledge().is_loaded());
    }

    #[test]
    fn classifier_failure_propagates() {
        let classifier = FixedClassifier::failing();
        let selector = selector_with(SOURCE, classifier.clone());

        let error = selector.respond("hi").expect_err("classifier failure should propagate");

        assert!(matches!(error, SelectionError::Model(ModelError::Shape(_))));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reload_removing_tag_turns_matches_into_fallbacks() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("data.json");
        std::fs::write(&path, SOURCE).expect("write source");
        let knowledge = Arc::new(SharedKnowledgeBase::from_path(&path));
        let selector = ResponseSelector::new(
            Arc::clone(&knowledge),
            RecordingExtractor::new(),
            FixedClassifier::returning(&[("greeting", 0.9)]),
        );
        assert_ne!(selector.respond("hi").expect("respond"), FALLBACK_MESSAGE);

        std::fs::write(&path, r#"{"intents":[{"tag":"thanks","patterns":[],"responses":["np"]}]}"#)
            .expect("rewrite source");
        knowledge.reload().expect("reload should succeed");

        assert!(!knowledge.get_all_tags().expect("tags").contains(&"greeting".to_string()));
        assert_eq!(selector.respond("hi").expect("respond"), FALLBACK_MESSAGE);
    }
}
