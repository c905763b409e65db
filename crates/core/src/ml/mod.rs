//! Intent classification
//!
//! A [`Classifier`] maps a feature vector to a probability distribution over
//! the fixed, ordered tag list it was trained with. The default
//! implementation runs a persisted feed-forward network (see [`network`]).

mod network;

pub use network::{DenseLayer, ModelArtifact, NeuralNetClassifier};

use crate::errors::ModelError;

pub trait Classifier: Send + Sync {
    /// Canonical tag order; stable for the lifetime of the classifier.
    fn tags(&self) -> &[String];

    fn predict(&self, features: &[f32]) -> Result<Prediction, ModelError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct TagProbability {
    pub tag: String,
    pub probability: f64,
}

impl TagProbability {
    pub fn new(tag: impl Into<String>, probability: f64) -> Self {
        Self { tag: tag.into(), probability }
    }
}

/// Output distribution in canonical tag order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Prediction {
    distribution: Vec<TagProbability>,
}

impl Prediction {
    pub fn new(distribution: Vec<TagProbability>) -> Self {
        Self { distribution }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self::new(pairs.into_iter().map(|(tag, probability)| TagProbability::new(tag, probability)).collect())
    }

    pub fn distribution(&self) -> &[TagProbability] {
        &self.distribution
    }

    pub fn is_empty(&self) -> bool {
        self.distribution.is_empty()
    }

    /// Highest-probability tag. Ties resolve to the earliest tag in
    /// canonical order; NaN entries are never selected.
    pub fn best(&self) -> Option<&TagProbability> {
        let mut best: Option<&TagProbability> = None;
        for candidate in &self.distribution {
            if candidate.probability.is_nan() {
                continue;
            }
            match best {
                Some(current) if candidate.probability <= current.probability => {}
                _ => best = Some(candidate),
            }
        }
        best
    }
}

/// Numerically stable softmax: shifts by the maximum logit before exponentiating.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|logit| (logit - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|value| value / total).collect()
}
