use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{softmax, Classifier, Prediction, TagProbability};
use crate::errors::ModelError;
use crate::nlp::BagOfWords;

/// Fully connected layer: `weights[out][in]` and one bias per output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl DenseLayer {
    pub fn input_size(&self) -> usize {
        self.weights.first().map(Vec::len).unwrap_or(0)
    }

    pub fn output_size(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias)
            .collect()
    }
}

/// Persisted classifier produced by the training pipeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Free-form version label
    #[serde(default)]
    pub version: String,
    pub input_size: usize,
    /// Width of the hidden layers, informational only
    #[serde(default)]
    pub hidden_size: usize,
    pub output_size: usize,
    /// Vocabulary, one entry per input feature
    pub all_words: Vec<String>,
    /// Canonical tag order, one entry per output
    pub tags: Vec<String>,
    pub layers: Vec<DenseLayer>,
}

impl ModelArtifact {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ModelError::Read { path: path.to_path_buf(), source })?;
        let artifact: Self = serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
            origin: path.display().to_string(),
            source,
        })?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ModelError> {
        let artifact: Self = serde_json::from_str(raw)
            .map_err(|source| ModelError::Parse { origin: "inline artifact".to_string(), source })?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.layers.is_empty() {
            return Err(ModelError::Shape("model has no layers".to_string()));
        }
        if self.all_words.len() != self.input_size {
            return Err(ModelError::Shape(format!(
                "vocabulary has {} words but input_size is {}",
                self.all_words.len(),
                self.input_size
            )));
        }
        if self.tags.len() != self.output_size {
            return Err(ModelError::Shape(format!(
                "model lists {} tags but output_size is {}",
                self.tags.len(),
                self.output_size
            )));
        }

        let mut expected_input = self.input_size;
        for (index, layer) in self.layers.iter().enumerate() {
            if layer.output_size() == 0 {
                return Err(ModelError::Shape(format!("layer {index} has no outputs")));
            }
            if layer.bias.len() != layer.output_size() {
                return Err(ModelError::Shape(format!(
                    "layer {index} has {} biases for {} outputs",
                    layer.bias.len(),
                    layer.output_size()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != expected_input) {
                return Err(ModelError::Shape(format!(
                    "layer {index} rows must have {expected_input} weights"
                )));
            }
            expected_input = layer.output_size();
        }

        if expected_input != self.output_size {
            return Err(ModelError::Shape(format!(
                "final layer produces {expected_input} outputs but output_size is {}",
                self.output_size
            )));
        }

        Ok(())
    }

    /// Extractor whose vector layout matches this model's input.
    pub fn feature_extractor(&self) -> BagOfWords {
        BagOfWords::new(self.all_words.clone())
    }
}

#[derive(Clone, Debug)]
pub struct NeuralNetClassifier {
    artifact: ModelArtifact,
}

impl NeuralNetClassifier {
    pub fn new(artifact: ModelArtifact) -> Result<Self, ModelError> {
        artifact.validate()?;
        Ok(Self { artifact })
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        Self::new(ModelArtifact::load(path)?)
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    fn logits(&self, features: &[f32]) -> Vec<f64> {
        let mut activations: Vec<f64> = features.iter().map(|value| f64::from(*value)).collect();
        let last = self.artifact.layers.len() - 1;
        for (index, layer) in self.artifact.layers.iter().enumerate() {
            activations = layer.forward(&activations);
            if index < last {
                activations.iter_mut().for_each(|value| *value = value.max(0.0));
            }
        }
        activations
    }
}

impl Classifier for NeuralNetClassifier {
    fn tags(&self) -> &[String] {
        &self.artifact.tags
    }

    fn predict(&self, features: &[f32]) -> Result<Prediction, ModelError> {
        if features.len() != self.artifact.input_size {
            return Err(ModelError::InputDimension {
                expected: self.artifact.input_size,
                actual: features.len(),
            });
        }

        let probabilities = softmax(&self.logits(features));
        Ok(Prediction::new(
            self.artifact
                .tags
                .iter()
                .zip(probabilities)
                .map(|(tag, probability)| TagProbability::new(tag.clone(), probability))
                .collect(),
        ))
    }
}
