//! Engine capability boundary.
//!
//! Everything behind these traits is synchronous and may block for a long
//! time (model loading, inference). Callers are expected to run them on a
//! blocking-capable thread.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::types::{Face, Image, RecognizableFace};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Opaque failure raised by the engine or its factory.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct EngineError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Detection, recognition and user management offered by a built engine.
pub trait FaceEngine: Send + Sync {
    /// Detect up to `limit` faces in an upright image.
    fn detect_faces(&self, image: &Image, limit: usize) -> Result<Vec<Face>, EngineError>;

    /// Build comparable templates for detected faces. May return fewer
    /// faces than given.
    fn recognizable_faces(
        &self,
        faces: &[Face],
        image: &Image,
    ) -> Result<Vec<RecognizableFace>, EngineError>;

    /// Similarity score between two face sets.
    fn compare(
        &self,
        subjects: &[RecognizableFace],
        candidates: &[RecognizableFace],
    ) -> Result<f32, EngineError>;

    /// Minimum score (inclusive) for a positive authentication.
    fn authentication_threshold(&self) -> f32;

    fn users(&self) -> Result<Vec<String>, EngineError>;

    fn faces_of_user(&self, user: &str) -> Result<Vec<RecognizableFace>, EngineError>;

    fn assign_faces(&self, faces: &[RecognizableFace], user: &str) -> Result<(), EngineError>;

    fn delete_users(&self, users: &[String]) -> Result<(), EngineError>;
}

/// Opaque engine sub-component (detection, recognition or user-management
/// factory), compared by identity.
#[derive(Clone)]
pub struct Component {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Component {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.inner).downcast_ref::<T>()
    }

    /// Address of the shared value; equal for clones of the same component.
    pub fn as_ptr(&self) -> *const () {
        Arc::as_ptr(&self.inner) as *const ()
    }

    pub fn same_as(&self, other: &Component) -> bool {
        std::ptr::eq(self.as_ptr(), other.as_ptr())
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("type", &self.type_name)
            .field("ptr", &self.as_ptr())
            .finish()
    }
}

/// Everything applied to a factory before the blocking engine build.
#[derive(Clone, Default)]
pub struct EngineOptions {
    pub detection: Option<Component>,
    pub recognition: Option<Component>,
    pub user_management: Option<Component>,
    pub credential: Option<String>,
}

impl fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineOptions")
            .field("detection", &self.detection.as_ref().map(Component::type_name))
            .field("recognition", &self.recognition.as_ref().map(Component::type_name))
            .field(
                "user_management",
                &self.user_management.as_ref().map(Component::type_name),
            )
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Builds an engine. `create_engine` blocks (model loading) and may fail.
pub trait EngineFactory: Send + Sync {
    fn create_engine(&self, options: &EngineOptions) -> Result<Arc<dyn FaceEngine>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DetectionModels {
        path: &'static str,
    }

    #[test]
    fn test_component_identity() {
        let a = Component::new(DetectionModels { path: "a" });
        let a_clone = a.clone();
        let b = Component::new(DetectionModels { path: "a" });
        assert!(a.same_as(&a_clone));
        assert!(!a.same_as(&b));
    }

    #[test]
    fn test_component_downcast() {
        let component = Component::new(DetectionModels { path: "models/det" });
        let models = component.downcast_ref::<DetectionModels>().unwrap();
        assert_eq!(models.path, "models/det");
        assert!(component.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_options_debug_redacts_credential() {
        let options = EngineOptions {
            credential: Some("hunter2".into()),
            ..Default::default()
        };
        let rendered = format!("{options:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_engine_error_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = EngineError::with_source("model load failed", io);
        assert_eq!(err.to_string(), "model load failed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
