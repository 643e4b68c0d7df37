//! In-process engine and factory doubles with call counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use facechain_core::{
    BoundingBox, Embedding, EngineError, EngineFactory, EngineOptions, Face, FaceEngine, Image,
    RecognizableFace,
};
use image::DynamicImage;

/// Template tagged with `tag`; [`StubEngine::compare`] scores by tag.
pub fn template(tag: &str) -> Embedding {
    Embedding {
        values: vec![0.5; 4],
        model_version: Some(tag.to_string()),
    }
}

pub fn face_at(x: f32) -> Face {
    Face::new(BoundingBox {
        x,
        y: 0.0,
        width: 4.0,
        height: 4.0,
    })
}

pub fn enrolled(tag: &str) -> RecognizableFace {
    RecognizableFace {
        face: face_at(0.0),
        embedding: template(tag),
    }
}

pub fn blank_image() -> Image {
    Image::upright(DynamicImage::new_rgb8(16, 16))
}

/// Engine whose comparisons return a fixed score per enrolled user.
///
/// `compare` looks for the first template tag (among subjects, then
/// candidates) that has a score and returns it, or `0.0`.
pub struct StubEngine {
    detected: Vec<Face>,
    converts: bool,
    fail_detection: bool,
    threshold: f32,
    scores: HashMap<String, f32>,
    enrolled: Mutex<HashMap<String, Vec<RecognizableFace>>>,
    pub detect_calls: AtomicUsize,
    pub convert_calls: AtomicUsize,
    pub compare_calls: AtomicUsize,
}

impl Default for StubEngine {
    fn default() -> Self {
        Self {
            detected: Vec::new(),
            converts: true,
            fail_detection: false,
            threshold: 4.0,
            scores: HashMap::new(),
            enrolled: Mutex::new(HashMap::new()),
            detect_calls: AtomicUsize::new(0),
            convert_calls: AtomicUsize::new(0),
            compare_calls: AtomicUsize::new(0),
        }
    }
}

impl StubEngine {
    pub fn with_faces(mut self, count: usize) -> Self {
        self.detected = (0..count).map(|i| face_at(i as f32 * 10.0)).collect();
        self
    }

    /// Enroll `user` with one face; comparisons involving it score `score`.
    pub fn with_user(self, user: &str, score: f32) -> Self {
        self.with_user_faces(user, score, 1)
    }

    pub fn with_user_faces(mut self, user: &str, score: f32, faces: usize) -> Self {
        self.scores.insert(user.to_string(), score);
        self.enrolled
            .get_mut()
            .unwrap()
            .insert(user.to_string(), vec![enrolled(user); faces]);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Conversion yields zero recognizable faces.
    pub fn without_conversion(mut self) -> Self {
        self.converts = false;
        self
    }

    pub fn failing_detection(mut self) -> Self {
        self.fail_detection = true;
        self
    }
}

impl FaceEngine for StubEngine {
    fn detect_faces(&self, _image: &Image, limit: usize) -> Result<Vec<Face>, EngineError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_detection {
            return Err(EngineError::new("detector crashed"));
        }
        Ok(self.detected.iter().take(limit).cloned().collect())
    }

    fn recognizable_faces(
        &self,
        faces: &[Face],
        _image: &Image,
    ) -> Result<Vec<RecognizableFace>, EngineError> {
        self.convert_calls.fetch_add(1, Ordering::SeqCst);
        if !self.converts {
            return Ok(Vec::new());
        }
        Ok(faces
            .iter()
            .map(|face| RecognizableFace {
                face: face.clone(),
                embedding: template("probe"),
            })
            .collect())
    }

    fn compare(
        &self,
        subjects: &[RecognizableFace],
        candidates: &[RecognizableFace],
    ) -> Result<f32, EngineError> {
        self.compare_calls.fetch_add(1, Ordering::SeqCst);
        let score = subjects
            .iter()
            .chain(candidates)
            .filter_map(|f| f.embedding.model_version.as_ref())
            .find_map(|tag| self.scores.get(tag).copied())
            .unwrap_or(0.0);
        Ok(score)
    }

    fn authentication_threshold(&self) -> f32 {
        self.threshold
    }

    fn users(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.enrolled.lock().unwrap().keys().cloned().collect())
    }

    fn faces_of_user(&self, user: &str) -> Result<Vec<RecognizableFace>, EngineError> {
        Ok(self
            .enrolled
            .lock()
            .unwrap()
            .get(user)
            .cloned()
            .unwrap_or_default())
    }

    fn assign_faces(&self, faces: &[RecognizableFace], user: &str) -> Result<(), EngineError> {
        self.enrolled
            .lock()
            .unwrap()
            .entry(user.to_string())
            .or_default()
            .extend_from_slice(faces);
        Ok(())
    }

    fn delete_users(&self, users: &[String]) -> Result<(), EngineError> {
        let mut enrolled = self.enrolled.lock().unwrap();
        for user in users {
            enrolled.remove(user);
        }
        Ok(())
    }
}

/// Factory handing out one shared [`StubEngine`].
pub struct StubFactory {
    pub engine: Arc<StubEngine>,
    pub builds: AtomicUsize,
    failures_left: AtomicUsize,
    delay: Duration,
    pub last_options: Mutex<Option<EngineOptions>>,
}

impl Default for StubFactory {
    fn default() -> Self {
        Self::new(StubEngine::default())
    }
}

impl StubFactory {
    pub fn new(engine: StubEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            builds: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            delay: Duration::ZERO,
            last_options: Mutex::new(None),
        }
    }

    /// The first `count` builds fail.
    pub fn failing_first(mut self, count: usize) -> Self {
        self.failures_left = AtomicUsize::new(count);
        self
    }

    /// Each build blocks for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl EngineFactory for StubFactory {
    fn create_engine(&self, options: &EngineOptions) -> Result<Arc<dyn FaceEngine>, EngineError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(EngineError::new("license check failed"));
        }
        let engine: Arc<dyn FaceEngine> = self.engine.clone();
        Ok(engine)
    }
}
