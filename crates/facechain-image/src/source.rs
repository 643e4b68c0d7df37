use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use facechain_core::{Image, Orientation};
use reqwest::Url;

use crate::error::ImageError;
use crate::raster::{self, decode_image, normalize};

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Local(PathBuf),
    Remote(Url),
}

impl FromStr for ImageSource {
    type Err = ImageError;

    /// `http(s)://` URLs are remote, `file://` URLs and bare paths are local.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(s).map_err(|_| ImageError::InvalidSource(s.to_string()))?;
            return Ok(Self::Remote(url));
        }
        if lower.starts_with("file://") {
            let path = Url::parse(s)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| ImageError::InvalidSource(s.to_string()))?;
            return Ok(Self::Local(path));
        }
        if s.is_empty() {
            return Err(ImageError::InvalidSource(s.to_string()));
        }
        Ok(Self::Local(PathBuf::from(s)))
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::Local(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        Self::Local(path.to_path_buf())
    }
}

impl From<Url> for ImageSource {
    fn from(url: Url) -> Self {
        Self::Remote(url)
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Resolves [`ImageSource`]s to bytes and upright images.
///
/// Cheap to clone; clones share one HTTP connection pool.
#[derive(Clone, Debug)]
pub struct ImageLoader {
    client: reqwest::Client,
}

impl ImageLoader {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(ImageError::Client)?;
        Ok(Self { client })
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Read a local file or fetch a remote URL.
    pub async fn load_bytes(&self, source: &ImageSource) -> Result<Arc<[u8]>, ImageError> {
        match source {
            ImageSource::Local(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|source| ImageError::NotFound {
                        path: path.clone(),
                        source,
                    })?;
                tracing::debug!(path = %path.display(), len = bytes.len(), "read local image");
                Ok(bytes.into())
            }
            ImageSource::Remote(url) => self.fetch(url).await,
        }
    }

    async fn fetch(&self, url: &Url) -> Result<Arc<[u8]>, ImageError> {
        let connectivity = |message: String| ImageError::Connectivity {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| connectivity(e.to_string()))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(connectivity(format!("server responded with {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| connectivity(e.to_string()))?;
        tracing::debug!(%url, %status, len = body.len(), "fetched remote image");
        Ok(Arc::from(&body[..]))
    }

    /// Embedded EXIF orientation of a source, `Normal` when absent.
    pub async fn read_orientation(&self, source: &ImageSource) -> Result<Orientation, ImageError> {
        let bytes = self.load_bytes(source).await?;
        raster::read_orientation(bytes).await
    }

    /// Load, decode and orientation-correct a source.
    ///
    /// The bytes are fetched once; decoding and orientation parsing then run
    /// concurrently and both must finish before normalization.
    pub async fn to_domain_image(&self, source: &ImageSource) -> Result<Image, ImageError> {
        let bytes = self.load_bytes(source).await?;
        let (raster, orientation) = tokio::try_join!(
            decode_image(Arc::clone(&bytes)),
            raster::read_orientation(bytes),
        )?;
        tracing::debug!(%source, ?orientation, "image loaded");
        normalize(raster, orientation).await
    }
}
