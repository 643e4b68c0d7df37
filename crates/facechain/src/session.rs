//! Capture session results delivered inside a JSON envelope.

use std::path::Path;

use facechain_core::{Bearing, Embedding, Face, RecognizableFace};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::{PipelineError, PipelineResult};
use crate::stages::FaceStream;

/// Envelope key holding the serialized [`SessionResult`].
pub const RESULT_KEY: &str = "facechain.session.result";

pub type Envelope = serde_json::Map<String, Value>;

/// Failure reported by the capture session itself.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct SessionFailure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face: Option<Face>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,
    /// Required: an attachment without a bearing makes the result undecodable.
    pub bearing: Bearing,
}

impl Attachment {
    pub fn recognizable_face(&self) -> Option<RecognizableFace> {
        Some(RecognizableFace {
            face: self.face.clone()?,
            embedding: self.embedding.clone()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionFailure>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A captured face with the image it was taken from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapturedFace {
    pub image_uri: String,
    pub face: Face,
    pub bearing: Bearing,
}

pub fn envelope_from_str(source: &str) -> PipelineResult<Envelope> {
    serde_json::from_str(source).map_err(|e| PipelineError::InvalidEnvelope(e.to_string()))
}

pub async fn envelope_from_file(path: &Path) -> PipelineResult<Envelope> {
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::NotFound(format!("{}: {e}", path.display())))?;
    envelope_from_str(&source)
}

/// Extract the session result from an envelope.
///
/// An absent envelope, a missing or null payload, or an undecodable payload
/// is `InvalidEnvelope`. A result carrying its own failure surfaces that
/// failure as `EmbeddedFailure`.
pub fn parse_result(envelope: Option<&Envelope>) -> PipelineResult<SessionResult> {
    let envelope =
        envelope.ok_or_else(|| PipelineError::InvalidEnvelope("no envelope given".into()))?;
    let payload = match envelope.get(RESULT_KEY) {
        None | Some(Value::Null) => {
            return Err(PipelineError::InvalidEnvelope(format!(
                "missing result under '{RESULT_KEY}'"
            )))
        }
        Some(payload) => payload,
    };
    let result = SessionResult::deserialize(payload)
        .map_err(|e| PipelineError::InvalidEnvelope(format!("undecodable result: {e}")))?;
    if let Some(failure) = &result.error {
        return Err(PipelineError::EmbeddedFailure(failure.clone()));
    }
    tracing::debug!(attachments = result.attachments.len(), "session result parsed");
    Ok(result)
}

fn select<T, F>(result: &SessionResult, bearing: Option<Bearing>, pick: F) -> FaceStream<T>
where
    F: FnMut(&Attachment) -> Option<T>,
    T: Send + 'static,
{
    if let Some(failure) = &result.error {
        let err = PipelineError::EmbeddedFailure(failure.clone());
        return stream::iter([Err(err)]).boxed();
    }
    let picked: Vec<T> = result
        .attachments
        .iter()
        .filter(|a| bearing.map_or(true, |b| a.bearing == b))
        .filter_map(pick)
        .collect();
    stream::iter(picked.into_iter().map(Ok)).boxed()
}

/// Attachments with both a face and an image reference, optionally filtered
/// by bearing.
pub fn extract_attachments(
    result: &SessionResult,
    bearing: Option<Bearing>,
) -> FaceStream<CapturedFace> {
    select(result, bearing, |a| {
        Some(CapturedFace {
            image_uri: a.image_uri.clone()?,
            face: a.face.clone()?,
            bearing: a.bearing,
        })
    })
}

/// Attachments that already carry a template.
pub fn recognizable_faces(
    result: &SessionResult,
    bearing: Option<Bearing>,
) -> FaceStream<RecognizableFace> {
    select(result, bearing, Attachment::recognizable_face)
}

pub fn image_uris(result: &SessionResult, bearing: Option<Bearing>) -> FaceStream<String> {
    select(result, bearing, |a| a.image_uri.clone())
}
