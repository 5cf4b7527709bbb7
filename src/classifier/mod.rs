use async_trait::async_trait;
use image::{codecs::jpeg::JpegEncoder, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod remote;

pub use remote::RemoteClassifier;

/// Sentinel label for a frame with no detectable face. Never persisted;
/// the batch drops it on append.
pub const NO_FACE: &str = "NO FACE";

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
    #[error("detection request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("detection service returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("malformed detection response: {0}")]
    InvalidResponse(String),
}

/// One (label, confidence) entry as reported by the detection service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    #[serde(rename = "Type")]
    pub label: String,
    #[serde(rename = "Confidence")]
    pub confidence: f64,
}

/// Outcome of classifying one frame. `NoFace` is a first-class result, not
/// an error: an empty room is a normal thing to point a webcam at.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Face {
        emotion: String,
        confidence: f64,
        all_emotions: Vec<EmotionScore>,
    },
    NoFace,
}

impl Detection {
    pub fn label(&self) -> &str {
        match self {
            Detection::Face { emotion, .. } => emotion,
            Detection::NoFace => NO_FACE,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Detection::Face { confidence, .. } => *confidence,
            Detection::NoFace => 0.0,
        }
    }
}

/// Narrow seam in front of the cloud face-emotion service, so the pipeline
/// and the API can run against a deterministic stand-in under test.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classifies one already-encoded (JPEG) image.
    async fn classify(&self, image: &[u8]) -> Result<Detection, ClassifierError>;
}

/// Compresses a raw frame to JPEG for transmission. Fails fast, before any
/// network traffic, if the frame cannot be encoded.
pub fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>, ClassifierError> {
    let mut buf = Vec::new();
    JpegEncoder::new(&mut buf).encode_image(frame)?;
    Ok(buf)
}

/// Encode-then-classify, the shape the tracking loop consumes.
pub async fn classify_frame(
    classifier: &dyn Classifier,
    frame: &RgbImage,
) -> Result<Detection, ClassifierError> {
    let encoded = encode_jpeg(frame)?;
    classifier.classify(&encoded).await
}
