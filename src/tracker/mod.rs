use std::time::Duration;

mod batch;
mod controller;
mod loop_worker;
mod sampler;

pub use batch::EmotionBatch;
pub use controller::{TrackerController, TrackerStatus};
pub use sampler::FrameSampler;

pub const DEFAULT_FPS: u32 = 24;
pub const DEFAULT_SAMPLE_INTERVAL: u32 = 24;
pub const DEFAULT_BATCH_SIZE: usize = 60;

/// Knobs for a capture session. The defaults classify roughly once per
/// second and flush about once per minute.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Delay between frame grabs.
    pub frame_interval: Duration,
    /// Classify every Nth frame.
    pub sample_interval: u32,
    /// Flush to the store once this many samples are buffered.
    pub batch_size: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            frame_interval: frame_interval_for_fps(DEFAULT_FPS),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Grab interval for a nominal frame rate, floored at 1ms so extreme rates
/// cannot collapse the loop timer to a zero period.
pub fn frame_interval_for_fps(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(fps.max(1))).max(Duration::from_millis(1))
}
