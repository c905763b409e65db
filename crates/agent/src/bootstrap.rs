use std::sync::Arc;

use arthur_core::config::{AppConfig, ConfigError, LoadOptions};
use arthur_core::errors::{KnowledgeBaseError, ModelError};
use arthur_core::knowledge::SharedKnowledgeBase;
use arthur_core::ml::{Classifier, ModelArtifact, NeuralNetClassifier};
use arthur_core::selector::{ResponsePicker, ResponseSelector, SeededPicker, ThreadRngPicker};
use thiserror::Error;
use tracing::{info, warn};

use crate::runtime::ChatRuntime;

pub struct Application {
    pub config: AppConfig,
    pub knowledge: Arc<SharedKnowledgeBase>,
    pub runtime: ChatRuntime,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model initialization failed: {0}")]
    Model(#[from] ModelError),
    #[error("knowledge base preload failed: {0}")]
    KnowledgeBase(#[from] KnowledgeBaseError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let artifact = ModelArtifact::load(&config.model.path)?;
    let extractor = Arc::new(artifact.feature_extractor());
    let classifier = Arc::new(NeuralNetClassifier::new(artifact)?);
    info!(
        event_name = "system.bootstrap.model_loaded",
        path = %config.model.path.display(),
        version = %classifier.artifact().version,
        tags = classifier.tags().len(),
        vocabulary = extractor.dimension(),
        "intent model loaded"
    );

    let knowledge = Arc::new(SharedKnowledgeBase::from_path(&config.knowledge.path));
    if config.knowledge.preload {
        let snapshot = knowledge.load()?;
        let missing: Vec<&str> = classifier
            .tags()
            .iter()
            .filter(|tag| snapshot.intent_by_tag(tag).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            warn!(
                event_name = "system.bootstrap.tag_mismatch",
                missing = ?missing,
                "model tags without a knowledge base intent will fall back"
            );
        }
    }

    let picker: Arc<dyn ResponsePicker> = match config.responses.seed {
        Some(seed) => Arc::new(SeededPicker::new(seed)),
        None => Arc::new(ThreadRngPicker),
    };
    let selector = ResponseSelector::new(Arc::clone(&knowledge), extractor, classifier)
        .with_picker(picker)
        .with_confidence_threshold(config.model.confidence_threshold);

    info!(
        event_name = "system.bootstrap.ready",
        knowledge_path = %config.knowledge.path.display(),
        preloaded = knowledge.is_loaded(),
        confidence_threshold = config.model.confidence_threshold,
        "response selector ready"
    );

    Ok(Application { config, knowledge, runtime: ChatRuntime::new(selector) })
}
