//! Process-wide intent store.
//!
//! A [`SharedKnowledgeBase`] is constructed once and handed out as an
//! `Arc`. It starts unloaded, materializes from its [`KnowledgeSource`] on
//! first access and can be reloaded at any time. Every publish swaps in a
//! complete [`KnowledgeBase`] snapshot, so a reader holding a snapshot sees
//! exactly one generation of the data.

mod source;

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::{info, warn};

pub use source::{JsonFileSource, KnowledgeSource, StaticSource};

use crate::domain::intent::{Intent, KnowledgeBase};
use crate::errors::KnowledgeBaseError;

pub struct SharedKnowledgeBase {
    source: Box<dyn KnowledgeSource>,
    loaded: AtomicBool,
    generation: AtomicU64,
    data: RwLock<Option<Arc<KnowledgeBase>>>,
    load_lock: Mutex<()>,
}

impl SharedKnowledgeBase {
    pub fn new(source: impl KnowledgeSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            loaded: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            data: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonFileSource::new(path))
    }

    /// Materializes the knowledge base if it is not loaded yet.
    ///
    /// Concurrent first callers serialize on the load lock; only the first
    /// one reads the source, the others observe its published snapshot.
    pub fn load(&self) -> Result<Arc<KnowledgeBase>, KnowledgeBaseError> {
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }

        let _guard = lock(&self.load_lock);
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }

        self.fetch_and_publish("load")
    }

    /// Replaces the current generation with a fresh read of the source.
    ///
    /// Readers keep seeing the previous snapshot until the new one is
    /// swapped in. On failure the store drops back to unloaded.
    pub fn reload(&self) -> Result<Arc<KnowledgeBase>, KnowledgeBaseError> {
        let _guard = lock(&self.load_lock);
        self.fetch_and_publish("reload")
    }

    pub fn get_data(&self) -> Result<Arc<KnowledgeBase>, KnowledgeBaseError> {
        self.load()
    }

    pub fn get_intents(&self) -> Result<Vec<Intent>, KnowledgeBaseError> {
        Ok(self.load()?.intents().to_vec())
    }

    pub fn get_intent_by_tag(&self, tag: &str) -> Result<Option<Intent>, KnowledgeBaseError> {
        Ok(self.load()?.intent_by_tag(tag).cloned())
    }

    pub fn get_all_tags(&self) -> Result<Vec<String>, KnowledgeBaseError> {
        Ok(self.load()?.all_tags())
    }

    pub fn get_all_patterns(&self) -> Result<Vec<String>, KnowledgeBaseError> {
        Ok(self.load()?.all_patterns())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Number of successful publishes so far; `0` until the first load.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    fn current(&self) -> Option<Arc<KnowledgeBase>> {
        if !self.loaded.load(Ordering::Acquire) {
            return None;
        }
        read(&self.data).clone()
    }

    // Caller must hold `load_lock`.
    fn fetch_and_publish(
        &self,
        operation: &'static str,
    ) -> Result<Arc<KnowledgeBase>, KnowledgeBaseError> {
        match self.source.fetch() {
            Ok(knowledge) => {
                let snapshot = Arc::new(knowledge);
                *write(&self.data) = Some(Arc::clone(&snapshot));
                let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                self.loaded.store(true, Ordering::Release);
                info!(
                    event_name = "knowledge.publish.completed",
                    operation,
                    source = %self.source.describe(),
                    intents = snapshot.len(),
                    generation,
                    "knowledge base loaded"
                );
                Ok(snapshot)
            }
            Err(error) => {
                self.loaded.store(false, Ordering::Release);
                *write(&self.data) = None;
                warn!(
                    event_name = "knowledge.publish.failed",
                    operation,
                    source = %self.source.describe(),
                    error_class = error.class(),
                    error = %error,
                    "knowledge base could not be loaded"
                );
                Err(error)
            }
        }
    }
}

impl fmt::Debug for SharedKnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKnowledgeBase")
            .field("source", &self.source.describe())
            .field("loaded", &self.is_loaded())
            .field("generation", &self.generation())
            .finish()
    }
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn read(
    data: &RwLock<Option<Arc<KnowledgeBase>>>,
) -> std::sync::RwLockReadGuard<'_, Option<Arc<KnowledgeBase>>> {
    match data.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write(
    data: &RwLock<Option<Arc<KnowledgeBase>>>,
) -> std::sync::RwLockWriteGuard<'_, Option<Arc<KnowledgeBase>>> {
    match data.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
