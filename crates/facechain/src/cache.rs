use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use facechain_image::ImageLoader;

use crate::config::Settings;
use crate::configuration::Configuration;
use crate::error::PipelineResult;
use crate::orchestrator::Orchestrator;

/// Registry of orchestrators keyed by [`Configuration`].
///
/// Equal configurations always get the same orchestrator, and therefore
/// share one engine. Entries live until [`clear`](Self::clear).
pub struct InstanceCache {
    settings: Settings,
    loader: ImageLoader,
    entries: Mutex<HashMap<Configuration, Arc<Orchestrator>>>,
}

impl InstanceCache {
    pub fn new(settings: Settings) -> PipelineResult<Self> {
        let loader = ImageLoader::new(settings.http_timeout(), &settings.user_agent)?;
        Ok(Self::with_loader(settings, loader))
    }

    pub fn with_loader(settings: Settings, loader: ImageLoader) -> Self {
        Self {
            settings,
            loader,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Return the orchestrator for `configuration`, creating it on first use.
    ///
    /// Never builds the engine; that happens on the orchestrator's first
    /// operation.
    pub fn build(&self, configuration: Configuration) -> Arc<Orchestrator> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let cached = entries.len();
        let orchestrator = entries.entry(configuration).or_insert_with_key(|key| {
            tracing::info!(cached, ?key, "orchestrator created");
            Arc::new(Orchestrator::new(
                key.clone(),
                self.settings.clone(),
                self.loader.clone(),
            ))
        });
        Arc::clone(orchestrator)
    }

    pub fn lookup(&self, configuration: &Configuration) -> Option<Arc<Orchestrator>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(configuration)
            .cloned()
    }

    /// Forget every cached orchestrator. Handles already given out stay usable.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let dropped = entries.len();
        entries.clear();
        tracing::info!(dropped, "instance cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
