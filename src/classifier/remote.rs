use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::{Classifier, ClassifierError, Detection, EmotionScore};

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Serialize)]
struct DetectFacesRequest {
    #[serde(rename = "Image")]
    image: ImagePayload,
    #[serde(rename = "Attributes")]
    attributes: Vec<String>,
}

#[derive(Serialize)]
struct ImagePayload {
    #[serde(rename = "Bytes")]
    bytes: String,
}

#[derive(Deserialize)]
struct DetectFacesResponse {
    #[serde(rename = "FaceDetails")]
    face_details: Vec<FaceDetail>,
}

#[derive(Deserialize)]
struct FaceDetail {
    #[serde(rename = "Emotions", default)]
    emotions: Vec<EmotionScore>,
}

/// HTTP client for the cloud face-emotion service. The request carries the
/// image as base64 plus an explicit ask for emotion attributes; the response
/// lists face entries whose emotions arrive ordered by descending
/// confidence.
pub struct RemoteClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteClassifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Classifier for RemoteClassifier {
    async fn classify(&self, image: &[u8]) -> Result<Detection, ClassifierError> {
        let request = DetectFacesRequest {
            image: ImagePayload {
                bytes: STANDARD.encode(image),
            },
            attributes: vec!["EMOTIONS".to_string()],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: DetectFacesResponse = response
            .json()
            .await
            .map_err(|err| ClassifierError::InvalidResponse(err.to_string()))?;

        Ok(top_emotion(parsed))
    }
}

/// First face entry, first emotion entry. A face without emotion entries
/// carries nothing worth recording and degrades to `NoFace`.
fn top_emotion(response: DetectFacesResponse) -> Detection {
    let Some(face) = response.face_details.into_iter().next() else {
        return Detection::NoFace;
    };

    match face.emotions.first() {
        Some(top) => Detection::Face {
            emotion: top.label.clone(),
            confidence: top.confidence,
            all_emotions: face.emotions,
        },
        None => Detection::NoFace,
    }
}
