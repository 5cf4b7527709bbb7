/// Every-Nth-frame gate in front of the classifier. Frames that fail the
/// gate are dropped before any encoding or network work happens.
#[derive(Debug, Clone, Copy)]
pub struct FrameSampler {
    interval: u32,
}

impl FrameSampler {
    /// An interval of 0 is normalized to 1 (classify every frame).
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
        }
    }

    /// Frame counts start at 1, so the first sampled frame is the Nth.
    pub fn should_sample(&self, frame_count: u64) -> bool {
        frame_count % u64::from(self.interval) == 0
    }
}
