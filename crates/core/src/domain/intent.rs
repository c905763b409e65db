use serde::{Deserialize, Deserializer, Serialize};

/// One conversational category: the phrases that train it and the replies it can produce.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tag: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub patterns: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub responses: Vec<String>,
}

// An explicit `null` reads the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Intent {
    pub fn new(
        tag: impl Into<String>,
        patterns: impl IntoIterator<Item = impl Into<String>>,
        responses: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            tag: tag.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
            responses: responses.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered set of intents as published by one load of the backing source.
///
/// Tag uniqueness is not enforced here; lookups resolve to the first match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    #[serde(default)]
    intents: Vec<Intent>,
}

impl KnowledgeBase {
    pub fn new(intents: Vec<Intent>) -> Self {
        Self { intents }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn intent_by_tag(&self, tag: &str) -> Option<&Intent> {
        self.intents.iter().find(|intent| intent.tag == tag)
    }

    /// Non-empty tags in stored order. Duplicates are kept.
    pub fn all_tags(&self) -> Vec<String> {
        self.intents
            .iter()
            .filter(|intent| !intent.tag.is_empty())
            .map(|intent| intent.tag.clone())
            .collect()
    }

    pub fn all_patterns(&self) -> Vec<String> {
        self.intents.iter().flat_map(|intent| intent.patterns.iter().cloned()).collect()
    }
}
