#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use chrono::{Days, Utc};
use image::RgbImage;
use tempfile::TempDir;

use emotrack::{
    api::AppState,
    camera::{CameraError, CameraFactory, FrameSource},
    classifier::{Classifier, ClassifierError, Detection, EmotionScore},
    db::Database,
    tracker::{TrackerConfig, TrackerController},
};

/// Store backed by a throwaway directory. Keep the guard alive for the
/// duration of the test.
pub fn temp_db() -> (Database, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let db = Database::new(dir.path().join("emotions.db")).expect("open store");
    (db, dir)
}

pub fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs_f64()
}

/// Noon UTC of the day `days` ago, as (timestamp, "YYYY-MM-DD"). Anchoring
/// to noon keeps day-bucketing assertions away from midnight edges.
pub fn noon_ago(days: u64) -> (f64, String) {
    let date = Utc::now().date_naive() - Days::new(days);
    let noon = date.and_hms_opt(12, 0, 0).expect("valid time");
    (
        noon.and_utc().timestamp() as f64,
        date.format("%Y-%m-%d").to_string(),
    )
}

pub fn test_frame() -> RgbImage {
    RgbImage::from_pixel(32, 32, image::Rgb([120, 90, 60]))
}

pub fn face(emotion: &str, confidence: f64) -> Detection {
    Detection::Face {
        emotion: emotion.to_string(),
        confidence,
        all_emotions: vec![EmotionScore {
            label: emotion.to_string(),
            confidence,
        }],
    }
}

/// Classifier that replays a script of detections, then falls back to a
/// fixed detection once the script runs out.
pub struct ScriptedClassifier {
    script: Mutex<Vec<Detection>>,
    fallback: Detection,
}

impl ScriptedClassifier {
    pub fn new(script: Vec<Detection>) -> Self {
        Self {
            script: Mutex::new(script),
            fallback: Detection::NoFace,
        }
    }

    pub fn repeating(detection: Detection) -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            fallback: detection,
        }
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, _image: &[u8]) -> Result<Detection, ClassifierError> {
        let mut script = self.script.lock().expect("script lock");
        if script.is_empty() {
            Ok(self.fallback.clone())
        } else {
            Ok(script.remove(0))
        }
    }
}

/// Classifier whose service is permanently down.
pub struct FailingClassifier;

#[async_trait]
impl Classifier for FailingClassifier {
    async fn classify(&self, _image: &[u8]) -> Result<Detection, ClassifierError> {
        Err(ClassifierError::Service {
            status: 503,
            message: "detection backend offline".to_string(),
        })
    }
}

/// Camera that serves a fixed number of frames, then fails like an
/// unplugged device.
pub struct CountedCamera {
    remaining: usize,
}

impl CountedCamera {
    pub fn new(frames: usize) -> Self {
        Self { remaining: frames }
    }
}

#[async_trait]
impl FrameSource for CountedCamera {
    async fn next_frame(&mut self) -> Result<RgbImage, CameraError> {
        if self.remaining == 0 {
            return Err(CameraError::Unavailable("no more frames".to_string()));
        }
        self.remaining -= 1;
        Ok(test_frame())
    }

    fn describe(&self) -> String {
        "counted-camera".to_string()
    }
}

/// Camera that never runs out of frames.
pub struct EndlessCamera;

#[async_trait]
impl FrameSource for EndlessCamera {
    async fn next_frame(&mut self) -> Result<RgbImage, CameraError> {
        Ok(test_frame())
    }

    fn describe(&self) -> String {
        "endless-camera".to_string()
    }
}

pub fn endless_camera_factory() -> CameraFactory {
    Arc::new(|| Ok(Box::new(EndlessCamera) as Box<dyn FrameSource>))
}

pub fn counted_camera_factory(frames: usize) -> CameraFactory {
    Arc::new(move || Ok(Box::new(CountedCamera::new(frames)) as Box<dyn FrameSource>))
}

/// App state wired to an endless stub camera and a fast session config.
pub fn test_state(db: Database, classifier: Arc<dyn Classifier>) -> AppState {
    let config = TrackerConfig {
        frame_interval: Duration::from_millis(2),
        sample_interval: 1,
        batch_size: 1000,
    };
    let tracker = TrackerController::new(
        db.clone(),
        classifier.clone(),
        endless_camera_factory(),
        config,
    );

    AppState {
        db,
        classifier,
        tracker,
    }
}
