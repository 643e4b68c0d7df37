//! Pipeline stages over an explicit engine handle.
//!
//! One-shot results are plain `async fn`s; finite sequences are
//! [`FaceStream`]s. Every engine call runs on tokio's blocking pool. Streams
//! are fail-fast: after the first error nothing else is emitted.

use std::future::Future;
use std::sync::Arc;

use facechain_core::{EngineError, Face, FaceEngine, Image, RecognizableFace};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Serialize;

use crate::error::{PipelineError, PipelineResult};

/// Finite, non-restartable sequence of pipeline values.
pub type FaceStream<T> = BoxStream<'static, PipelineResult<T>>;

/// One enrolled user's similarity to a probe face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identification {
    pub user: String,
    pub score: f32,
}

/// Run a blocking engine call off the async runtime.
///
/// A panicking engine surfaces as `EngineFailure`.
pub(crate) async fn run_blocking<T, F>(task: F) -> PipelineResult<T>
where
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| EngineError::with_source("engine task failed", e))?;
    Ok(outcome?)
}

fn flatten_once<T, Fut>(batch: Fut) -> FaceStream<T>
where
    Fut: Future<Output = PipelineResult<Vec<T>>> + Send + 'static,
    T: Send + 'static,
{
    stream::once(batch)
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, PipelineError>)))
        .try_flatten()
        .boxed()
}

fn from_blocking<T, F>(task: F) -> FaceStream<T>
where
    F: FnOnce() -> Result<Vec<T>, EngineError> + Send + 'static,
    T: Send + 'static,
{
    flatten_once(run_blocking(task))
}

/// Stop polling `inner` once it yields an error.
pub fn fail_fast<T: Send + 'static>(inner: FaceStream<T>) -> FaceStream<T> {
    stream::unfold(Some(inner), |state| async move {
        let Some(mut inner) = state else {
            return None;
        };
        match inner.next().await {
            Some(Ok(item)) => Some((Ok(item), Some(inner))),
            Some(Err(err)) => Some((Err(err), None)),
            None => None,
        }
    })
    .boxed()
}

/// Descending by score, ties by ascending user id.
pub fn rank(results: &mut [Identification]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.user.cmp(&b.user))
    });
}

pub fn detect_faces(engine: Arc<dyn FaceEngine>, image: Image, limit: usize) -> FaceStream<Face> {
    from_blocking(move || {
        let mut faces = engine.detect_faces(&image, limit)?;
        faces.truncate(limit);
        tracing::debug!(count = faces.len(), limit, "faces detected");
        Ok(faces)
    })
}

/// Convert one detected face. Zero results is a [`PipelineError::ConversionFailure`].
pub fn to_recognizable(
    engine: Arc<dyn FaceEngine>,
    image: Image,
    face: Face,
) -> FaceStream<RecognizableFace> {
    flatten_once(async move {
        let faces =
            run_blocking(move || engine.recognizable_faces(std::slice::from_ref(&face), &image))
                .await?;
        if faces.is_empty() {
            return Err(PipelineError::ConversionFailure);
        }
        Ok(faces)
    })
}

pub fn detect_recognizable_faces(
    engine: Arc<dyn FaceEngine>,
    image: Image,
    limit: usize,
) -> FaceStream<RecognizableFace> {
    let converter = Arc::clone(&engine);
    let detected = detect_faces(engine, image.clone(), limit);
    let converted = fail_fast(detected)
        .map_ok(move |face| to_recognizable(Arc::clone(&converter), image.clone(), face))
        .try_flatten()
        .boxed();
    fail_fast(converted).take(limit).boxed()
}

/// Best score of each enrolled user against any of `probes`, ranked.
///
/// Users without enrolled faces are skipped.
fn score_users(
    engine: &dyn FaceEngine,
    probes: &[RecognizableFace],
) -> Result<Vec<Identification>, EngineError> {
    let mut results = Vec::new();
    for user in engine.users()? {
        let enrolled = engine.faces_of_user(&user)?;
        if enrolled.is_empty() {
            continue;
        }
        let mut best: Option<f32> = None;
        for probe in probes {
            let score = engine.compare(std::slice::from_ref(probe), &enrolled)?;
            best = Some(best.map_or(score, |b| b.max(score)));
        }
        if let Some(score) = best {
            results.push(Identification { user, score });
        }
    }
    rank(&mut results);
    tracing::debug!(
        probes = probes.len(),
        candidates = results.len(),
        "users identified"
    );
    Ok(results)
}

/// Score a probe face against every enrolled user.
///
/// The whole result set is buffered and ranked before the first item is
/// emitted.
pub fn identify_users_in_face(
    engine: Arc<dyn FaceEngine>,
    face: RecognizableFace,
) -> FaceStream<Identification> {
    from_blocking(move || score_users(engine.as_ref(), &[face]))
}

/// Identify users against up to `limit` faces of `image`.
///
/// Each user appears once, with its best score over all detected faces,
/// and the combined set is ranked as a whole.
pub fn identify_users_in_image(
    engine: Arc<dyn FaceEngine>,
    image: Image,
    limit: usize,
) -> FaceStream<Identification> {
    let scorer = Arc::clone(&engine);
    let probes = detect_recognizable_faces(engine, image, limit);
    flatten_once(async move {
        let probes: Vec<RecognizableFace> = probes.try_collect().await?;
        if probes.is_empty() {
            return Ok(Vec::new());
        }
        run_blocking(move || score_users(scorer.as_ref(), &probes)).await
    })
}

pub async fn compare_face_to_faces(
    engine: Arc<dyn FaceEngine>,
    face: RecognizableFace,
    faces: Vec<RecognizableFace>,
) -> PipelineResult<f32> {
    run_blocking(move || engine.compare(std::slice::from_ref(&face), &faces)).await
}

/// Compare `user`'s enrolled faces against all `faces` in one call.
///
/// Accepted when the score reaches the engine's threshold (inclusive). A user
/// without enrolled faces is [`PipelineError::NotFound`].
pub async fn authenticate_user_in_faces(
    engine: Arc<dyn FaceEngine>,
    user: &str,
    faces: Vec<RecognizableFace>,
) -> PipelineResult<bool> {
    let owned = user.to_string();
    let verdict = run_blocking(move || {
        let enrolled = engine.faces_of_user(&owned)?;
        if enrolled.is_empty() {
            return Ok(None);
        }
        let score = engine.compare(&enrolled, &faces)?;
        Ok(Some((score, engine.authentication_threshold())))
    })
    .await?;

    let (score, threshold) =
        verdict.ok_or_else(|| PipelineError::NotFound(format!("user '{user}' has no enrolled faces")))?;
    let accepted = score >= threshold;
    tracing::debug!(user, score, threshold, accepted, "authentication compared");
    Ok(accepted)
}

pub async fn authenticate_user_in_face(
    engine: Arc<dyn FaceEngine>,
    user: &str,
    face: RecognizableFace,
) -> PipelineResult<bool> {
    authenticate_user_in_faces(engine, user, vec![face]).await
}

/// Check up to `max_candidates` faces of `image` one by one, stopping at the
/// first match. No faces or no match is `false`, not an error.
pub async fn authenticate_user_in_image(
    engine: Arc<dyn FaceEngine>,
    user: &str,
    image: Image,
    max_candidates: usize,
) -> PipelineResult<bool> {
    let mut candidates = detect_recognizable_faces(Arc::clone(&engine), image, max_candidates);
    let mut checked = 0usize;
    while let Some(face) = candidates.try_next().await? {
        checked += 1;
        if authenticate_user_in_face(Arc::clone(&engine), user, face).await? {
            tracing::info!(user, checked, "user authenticated");
            return Ok(true);
        }
    }
    tracing::info!(user, checked, "no matching face");
    Ok(false)
}

// --- User management

/// Enrolled user ids, ascending.
pub async fn users(engine: Arc<dyn FaceEngine>) -> PipelineResult<Vec<String>> {
    let mut users = run_blocking(move || engine.users()).await?;
    users.sort();
    Ok(users)
}

pub fn faces_of_user(engine: Arc<dyn FaceEngine>, user: &str) -> FaceStream<RecognizableFace> {
    let user = user.to_string();
    from_blocking(move || engine.faces_of_user(&user))
}

pub async fn assign_faces_to_user(
    engine: Arc<dyn FaceEngine>,
    faces: Vec<RecognizableFace>,
    user: &str,
) -> PipelineResult<()> {
    let owned = user.to_string();
    let count = faces.len();
    run_blocking(move || engine.assign_faces(&faces, &owned)).await?;
    tracing::info!(user, count, "faces assigned");
    Ok(())
}

pub async fn assign_face_to_user(
    engine: Arc<dyn FaceEngine>,
    face: RecognizableFace,
    user: &str,
) -> PipelineResult<()> {
    assign_faces_to_user(engine, vec![face], user).await
}

pub async fn delete_user(engine: Arc<dyn FaceEngine>, user: &str) -> PipelineResult<()> {
    let users = vec![user.to_string()];
    run_blocking(move || engine.delete_users(&users)).await?;
    tracing::info!(user, "user deleted");
    Ok(())
}
