use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("capture device unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read frame: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),
}

/// A source of raw webcam frames. Each tracking session owns exactly one
/// and drops it when the session ends, whatever way the session ends.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Result<RgbImage, CameraError>;

    /// Identity for logs.
    fn describe(&self) -> String;
}

/// Builds a fresh capture device for each session, so a stopped session
/// never leaves a claim on the camera behind.
pub type CameraFactory =
    Arc<dyn Fn() -> Result<Box<dyn FrameSource>, CameraError> + Send + Sync>;

/// Capture device backed by a directory of image files. A camera agent (or
/// a test fixture) drops frames there; the source cycles through them in
/// name order, decoding each to raw pixels.
pub struct JpegDirectorySource {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    index: usize,
}

impl JpegDirectorySource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CameraError> {
        let dir = dir.as_ref().to_path_buf();

        let mut frames = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_frame = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
                .unwrap_or(false);
            if is_frame {
                frames.push(path);
            }
        }
        frames.sort();

        if frames.is_empty() {
            return Err(CameraError::Unavailable(format!(
                "no frames in {}",
                dir.display()
            )));
        }

        Ok(Self {
            dir,
            frames,
            index: 0,
        })
    }
}

#[async_trait]
impl FrameSource for JpegDirectorySource {
    async fn next_frame(&mut self) -> Result<RgbImage, CameraError> {
        let path = self.frames[self.index].clone();
        self.index = (self.index + 1) % self.frames.len();

        let bytes = tokio::fs::read(&path).await?;
        let image = image::load_from_memory(&bytes)?;
        Ok(image.to_rgb8())
    }

    fn describe(&self) -> String {
        format!("jpeg-dir:{}", self.dir.display())
    }
}
