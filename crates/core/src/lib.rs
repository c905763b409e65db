//! Arthur core: intent knowledge base and response selection.
//!
//! - `knowledge`: shared, lazily loaded and reloadable intent store
//! - `nlp`: utterance tokenization and bag-of-words features
//! - `ml`: classifier contract and the persisted feed-forward model
//! - `selector`: confidence-gated response selection with fallback

pub mod config;
pub mod domain;
pub mod errors;
pub mod knowledge;
pub mod ml;
pub mod nlp;
pub mod selector;

pub use domain::intent::{Intent, KnowledgeBase};
pub use errors::{KnowledgeBaseError, ModelError, SelectionError};
pub use knowledge::{JsonFileSource, KnowledgeSource, SharedKnowledgeBase, StaticSource};
pub use ml::{Classifier, ModelArtifact, NeuralNetClassifier, Prediction, TagProbability};
pub use nlp::{BagOfWords, FeatureExtractor};
pub use selector::{
    ResponsePicker, ResponseSelector, SeededPicker, Selection, SelectionOutcome, ThreadRngPicker,
    DEFAULT_CONFIDENCE_THRESHOLD, FALLBACK_MESSAGE,
};
