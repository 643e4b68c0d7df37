//! Cache key describing how an engine is built.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use facechain_core::{Component, EngineFactory, EngineOptions};

/// Which factory, optional components and credential an engine is built
/// from. Immutable once built.
///
/// Equality compares the factory and each component by identity (the same
/// shared instance) and the credential by value.
#[derive(Clone)]
pub struct Configuration {
    factory: Arc<dyn EngineFactory>,
    detection: Option<Component>,
    recognition: Option<Component>,
    user_management: Option<Component>,
    credential: Option<String>,
}

impl Configuration {
    pub fn builder(factory: Arc<dyn EngineFactory>) -> ConfigurationBuilder {
        ConfigurationBuilder {
            config: Configuration {
                factory,
                detection: None,
                recognition: None,
                user_management: None,
                credential: None,
            },
        }
    }

    pub fn factory(&self) -> &Arc<dyn EngineFactory> {
        &self.factory
    }

    /// Options handed to the factory when the engine is built.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            detection: self.detection.clone(),
            recognition: self.recognition.clone(),
            user_management: self.user_management.clone(),
            credential: self.credential.clone(),
        }
    }

    fn factory_ptr(&self) -> *const () {
        Arc::as_ptr(&self.factory) as *const ()
    }
}

fn same_component(a: &Option<Component>, b: &Option<Component>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same_as(b),
        (None, None) => true,
        _ => false,
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.factory_ptr(), other.factory_ptr())
            && same_component(&self.detection, &other.detection)
            && same_component(&self.recognition, &other.recognition)
            && same_component(&self.user_management, &other.user_management)
            && self.credential == other.credential
    }
}

impl Eq for Configuration {}

impl Hash for Configuration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.factory_ptr().hash(state);
        for component in [&self.detection, &self.recognition, &self.user_management] {
            component.as_ref().map(Component::as_ptr).hash(state);
        }
        self.credential.hash(state);
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("factory", &self.factory_ptr())
            .field("options", &self.engine_options())
            .finish()
    }
}

pub struct ConfigurationBuilder {
    config: Configuration,
}

impl ConfigurationBuilder {
    pub fn detection_factory(mut self, component: Component) -> Self {
        self.config.detection = Some(component);
        self
    }

    pub fn recognition_factory(mut self, component: Component) -> Self {
        self.config.recognition = Some(component);
        self
    }

    pub fn user_management_factory(mut self, component: Component) -> Self {
        self.config.user_management = Some(component);
        self
    }

    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.config.credential = Some(credential.into());
        self
    }

    pub fn build(self) -> Configuration {
        self.config
    }
}
