use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::intent::KnowledgeBase;
use crate::errors::KnowledgeBaseError;

/// Backing document a [`super::SharedKnowledgeBase`] materializes from.
pub trait KnowledgeSource: Send + Sync {
    fn describe(&self) -> String;

    fn fetch(&self) -> Result<KnowledgeBase, KnowledgeBaseError>;
}

#[derive(Clone, Debug)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KnowledgeSource for JsonFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<KnowledgeBase, KnowledgeBaseError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => KnowledgeBaseError::NotFound { path: self.path.clone() },
            _ => KnowledgeBaseError::Unexpected { origin: self.describe(), source },
        })?;

        KnowledgeBase::from_json_str(&raw)
            .map_err(|source| KnowledgeBaseError::Parse { origin: self.describe(), source })
    }
}

/// In-memory JSON document, parsed on every fetch like a file would be.
#[derive(Clone, Debug)]
pub struct StaticSource {
    document: String,
}

impl StaticSource {
    pub fn new(document: impl Into<String>) -> Self {
        Self { document: document.into() }
    }
}

impl KnowledgeSource for StaticSource {
    fn describe(&self) -> String {
        "inline document".to_string()
    }

    fn fetch(&self) -> Result<KnowledgeBase, KnowledgeBaseError> {
        KnowledgeBase::from_json_str(&self.document)
            .map_err(|source| KnowledgeBaseError::Parse { origin: self.describe(), source })
    }
}
