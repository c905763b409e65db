//! Utterance feature extraction.
//!
//! The classifier consumes a fixed-length bag-of-words vector aligned with
//! the vocabulary it was trained on.

use std::collections::{HashMap, HashSet};

pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, utterance: &str) -> Vec<f32>;
}

pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
}

/// Splits on anything that is not alphanumeric or an apostrophe.
/// Punctuation never survives as a token.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = normalize_text(text);
    let mut sanitized = String::with_capacity(normalized.len());
    for character in normalized.chars() {
        if character.is_alphanumeric() || character == '\'' {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized
        .split_whitespace()
        .map(|token| token.trim_matches('\''))
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BagOfWords {
    vocabulary: Vec<String>,
    positions: HashMap<String, usize>,
}

impl BagOfWords {
    pub fn new(vocabulary: Vec<String>) -> Self {
        let mut positions = HashMap::with_capacity(vocabulary.len());
        for (index, word) in vocabulary.iter().enumerate() {
            positions.entry(normalize_text(word)).or_insert(index);
        }
        Self { vocabulary, positions }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }
}

impl FeatureExtractor for BagOfWords {
    fn extract(&self, utterance: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.vocabulary.len()];
        let tokens: HashSet<String> = tokenize(utterance).into_iter().collect();
        for token in &tokens {
            if let Some(&index) = self.positions.get(token) {
                vector[index] = 1.0;
            }
        }
        vector
    }
}
