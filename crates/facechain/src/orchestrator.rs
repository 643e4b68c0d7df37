//! One configuration's lazily built engine and the pipeline over it.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use facechain_core::{
    EngineError, EngineFactory, EngineOptions, Face, FaceEngine, Image, RecognizableFace,
};
use facechain_image::{ImageLoader, ImageSource};
use futures::stream::{self, StreamExt, TryStreamExt};
use image::DynamicImage;
use tokio::sync::OnceCell;

use crate::config::Settings;
use crate::configuration::Configuration;
use crate::error::{PipelineError, PipelineResult};
use crate::stages::{self, run_blocking, FaceStream, Identification};

/// Memoized engine handle.
///
/// Check-build-store is a single `OnceCell` initialization, so concurrent
/// first callers share one build. A failed build leaves the cell empty.
#[derive(Clone)]
struct EngineSlot {
    cell: Arc<OnceCell<Arc<dyn FaceEngine>>>,
    factory: Arc<dyn EngineFactory>,
    options: EngineOptions,
}

impl EngineSlot {
    async fn get(&self) -> PipelineResult<Arc<dyn FaceEngine>> {
        if let Some(engine) = self.cell.get() {
            return Ok(Arc::clone(engine));
        }

        // Detached: dropping this future must not cancel the shared build.
        let slot = self.clone();
        let init = tokio::spawn(async move {
            slot.cell
                .get_or_try_init(|| slot.build())
                .await
                .map(Arc::clone)
        });
        init.await
            .map_err(|e| EngineError::with_source("engine build task failed", e))?
    }

    async fn build(&self) -> PipelineResult<Arc<dyn FaceEngine>> {
        let factory = Arc::clone(&self.factory);
        let options = self.options.clone();
        let started = Instant::now();
        match run_blocking(move || factory.create_engine(&options)).await {
            Ok(engine) => {
                tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "engine built"
                );
                Ok(engine)
            }
            Err(err) => {
                tracing::warn!(error = %err, "engine build failed");
                Err(err)
            }
        }
    }
}

/// Pipeline entry point for one [`Configuration`].
///
/// Every operation acquires the engine first, building it on first use.
pub struct Orchestrator {
    configuration: Configuration,
    settings: Settings,
    loader: ImageLoader,
    engine: EngineSlot,
}

impl Orchestrator {
    pub fn new(configuration: Configuration, settings: Settings, loader: ImageLoader) -> Self {
        let engine = EngineSlot {
            cell: Arc::new(OnceCell::new()),
            factory: Arc::clone(configuration.factory()),
            options: configuration.engine_options(),
        };
        Self {
            configuration,
            settings,
            loader,
            engine,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    pub fn is_engine_built(&self) -> bool {
        self.engine.cell.initialized()
    }

    /// The engine, built on first call. Later calls return the stored
    /// handle without suspending.
    pub async fn engine(&self) -> PipelineResult<Arc<dyn FaceEngine>> {
        self.engine.get().await
    }

    fn with_engine<T, F>(&self, stage: F) -> FaceStream<T>
    where
        F: FnOnce(Arc<dyn FaceEngine>) -> FaceStream<T> + Send + 'static,
        T: Send + 'static,
    {
        let slot = self.engine.clone();
        stream::once(async move { slot.get().await.map(stage) })
            .try_flatten()
            .boxed()
    }

    fn with_engine_and_image<T, F>(&self, source: &ImageSource, stage: F) -> FaceStream<T>
    where
        F: FnOnce(Arc<dyn FaceEngine>, Image) -> FaceStream<T> + Send + 'static,
        T: Send + 'static,
    {
        let prepared = self.prepare(source);
        stream::once(async move { prepared.await.map(|(engine, image)| stage(engine, image)) })
            .try_flatten()
            .boxed()
    }

    /// Engine and upright image, acquired concurrently.
    fn prepare(
        &self,
        source: &ImageSource,
    ) -> impl Future<Output = PipelineResult<(Arc<dyn FaceEngine>, Image)>> + Send + 'static {
        let slot = self.engine.clone();
        let loader = self.loader.clone();
        let source = source.clone();
        async move {
            let loaded = async { loader.to_domain_image(&source).await.map_err(PipelineError::from) };
            tokio::try_join!(slot.get(), loaded)
        }
    }

    // --- Images

    pub async fn to_domain_image(&self, source: &ImageSource) -> PipelineResult<Image> {
        Ok(self.loader.to_domain_image(source).await?)
    }

    pub async fn crop_to_face_in_source(
        &self,
        source: &ImageSource,
        face: &Face,
    ) -> PipelineResult<Arc<DynamicImage>> {
        let image = self.to_domain_image(source).await?;
        Ok(facechain_image::crop_to_face(&image, face).await?)
    }

    // --- Detection and recognition

    pub fn detect_faces(&self, image: Image, limit: usize) -> FaceStream<Face> {
        self.with_engine(move |engine| stages::detect_faces(engine, image, limit))
    }

    pub fn detect_faces_in_source(&self, source: &ImageSource, limit: usize) -> FaceStream<Face> {
        self.with_engine_and_image(source, move |engine, image| {
            stages::detect_faces(engine, image, limit)
        })
    }

    pub fn to_recognizable(&self, image: Image, face: Face) -> FaceStream<RecognizableFace> {
        self.with_engine(move |engine| stages::to_recognizable(engine, image, face))
    }

    pub fn detect_recognizable_faces(
        &self,
        image: Image,
        limit: usize,
    ) -> FaceStream<RecognizableFace> {
        self.with_engine(move |engine| stages::detect_recognizable_faces(engine, image, limit))
    }

    pub fn detect_recognizable_faces_in_source(
        &self,
        source: &ImageSource,
        limit: usize,
    ) -> FaceStream<RecognizableFace> {
        self.with_engine_and_image(source, move |engine, image| {
            stages::detect_recognizable_faces(engine, image, limit)
        })
    }

    // --- Identification

    pub fn identify_users_in_face(&self, face: RecognizableFace) -> FaceStream<Identification> {
        self.with_engine(move |engine| stages::identify_users_in_face(engine, face))
    }

    pub fn identify_users_in_image(&self, image: Image) -> FaceStream<Identification> {
        let limit = self.settings.identification_faces;
        self.with_engine(move |engine| stages::identify_users_in_image(engine, image, limit))
    }

    pub fn identify_users_in_source(&self, source: &ImageSource) -> FaceStream<Identification> {
        let limit = self.settings.identification_faces;
        self.with_engine_and_image(source, move |engine, image| {
            stages::identify_users_in_image(engine, image, limit)
        })
    }

    pub async fn compare_face_to_faces(
        &self,
        face: RecognizableFace,
        faces: Vec<RecognizableFace>,
    ) -> PipelineResult<f32> {
        stages::compare_face_to_faces(self.engine().await?, face, faces).await
    }

    // --- Authentication

    pub async fn authenticate_user_in_faces(
        &self,
        user: &str,
        faces: Vec<RecognizableFace>,
    ) -> PipelineResult<bool> {
        stages::authenticate_user_in_faces(self.engine().await?, user, faces).await
    }

    pub async fn authenticate_user_in_face(
        &self,
        user: &str,
        face: RecognizableFace,
    ) -> PipelineResult<bool> {
        stages::authenticate_user_in_face(self.engine().await?, user, face).await
    }

    pub async fn authenticate_user_in_image(&self, user: &str, image: Image) -> PipelineResult<bool> {
        let engine = self.engine().await?;
        let candidates = self.settings.authentication_candidates;
        stages::authenticate_user_in_image(engine, user, image, candidates).await
    }

    pub async fn authenticate_user_in_source(
        &self,
        user: &str,
        source: &ImageSource,
    ) -> PipelineResult<bool> {
        let (engine, image) = self.prepare(source).await?;
        let candidates = self.settings.authentication_candidates;
        stages::authenticate_user_in_image(engine, user, image, candidates).await
    }

    // --- User management

    pub async fn users(&self) -> PipelineResult<Vec<String>> {
        stages::users(self.engine().await?).await
    }

    pub fn faces_of_user(&self, user: &str) -> FaceStream<RecognizableFace> {
        let user = user.to_string();
        self.with_engine(move |engine| stages::faces_of_user(engine, &user))
    }

    pub async fn assign_faces_to_user(
        &self,
        faces: Vec<RecognizableFace>,
        user: &str,
    ) -> PipelineResult<()> {
        stages::assign_faces_to_user(self.engine().await?, faces, user).await
    }

    pub async fn assign_face_to_user(&self, face: RecognizableFace, user: &str) -> PipelineResult<()> {
        stages::assign_face_to_user(self.engine().await?, face, user).await
    }

    pub async fn delete_user(&self, user: &str) -> PipelineResult<()> {
        stages::delete_user(self.engine().await?, user).await
    }
}
