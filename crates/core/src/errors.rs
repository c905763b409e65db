use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeBaseError {
    #[error("knowledge base source was not found at `{path}`")]
    NotFound { path: PathBuf },
    #[error("could not parse knowledge base `{origin}`: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected error loading knowledge base `{origin}`: {source}")]
    Unexpected {
        origin: String,
        #[source]
        source: io::Error,
    },
}

impl KnowledgeBaseError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Parse { .. } => "parse_error",
            Self::Unexpected { .. } => "unexpected_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("could not read model artifact `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse model artifact `{origin}`: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("model artifact is inconsistent: {0}")]
    Shape(String),
    #[error("feature vector has {actual} entries but the model expects {expected}")]
    InputDimension { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(transparent)]
    KnowledgeBase(#[from] KnowledgeBaseError),
    #[error(transparent)]
    Model(#[from] ModelError),
}
