//! Face detection and embedding distance

use serde::{Deserialize, Serialize};

use crate::vision::{FaceBox, Frame};
use crate::{Error, Result};

/// A face found in a frame with its embedding
#[derive(Debug, Clone, Deserialize)]
pub struct DetectedFace {
    #[serde(flatten)]
    pub location: FaceBox,
    pub embedding: Vec<f32>,
}

/// Finds faces in a frame and computes their embeddings
pub trait FaceDetector: Send + Sync {
    /// Detected faces, in the detector's order
    ///
    /// # Errors
    ///
    /// Returns error if detection fails
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>>;
}

#[derive(Debug, Serialize)]
struct DetectRequest {
    /// Base64 JPEG
    image: String,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<DetectedFace>,
}

/// Face detection via a local HTTP embedding service
///
/// POSTs `{"image": <base64 jpeg>}` and reads
/// `{"faces": [{"top", "right", "bottom", "left", "embedding"}]}`.
pub struct HttpFaceDetector {
    client: reqwest::Client,
    url: String,
    runtime: tokio::runtime::Handle,
}

impl HttpFaceDetector {
    #[must_use]
    pub fn new(url: String, runtime: tokio::runtime::Handle) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            runtime,
        }
    }

    async fn request(&self, jpeg: Vec<u8>) -> Result<Vec<DetectedFace>> {
        use base64::Engine;

        let request = DetectRequest {
            image: base64::engine::general_purpose::STANDARD.encode(jpeg),
        };

        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Identity(format!(
                "face service error {status}: {body}"
            )));
        }

        let result: DetectResponse = response
            .json()
            .await
            .map_err(|e| Error::Identity(format!("invalid face service response: {e}")))?;

        Ok(result.faces)
    }
}

impl FaceDetector for HttpFaceDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>> {
        let jpeg = frame.to_jpeg()?;
        let faces = self.runtime.block_on(self.request(jpeg))?;
        tracing::trace!(count = faces.len(), "faces detected");
        Ok(faces)
    }
}

/// Euclidean distance between two embeddings
///
/// Embeddings of different lengths never match.
#[must_use]
pub fn face_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }

    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}
