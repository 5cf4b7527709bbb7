use anyhow::Result;

use crate::classifier::NO_FACE;
use crate::db::{Database, EmotionRecord};

/// In-memory buffer between the classifier and the store. Samples
/// accumulate in arrival order until the flush threshold is reached.
pub struct EmotionBatch {
    threshold: usize,
    entries: Vec<EmotionRecord>,
}

impl EmotionBatch {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            entries: Vec::new(),
        }
    }

    /// Appends one sample. The `NO FACE` sentinel is dropped here and never
    /// reaches the store. Returns whether the sample was appended.
    pub fn record(&mut self, timestamp: f64, emotion: &str) -> bool {
        if emotion == NO_FACE {
            return false;
        }

        self.entries.push(EmotionRecord {
            timestamp,
            emotion: emotion.to_string(),
        });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once the buffer has reached the flush threshold.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.threshold
    }

    /// Writes the buffered samples to the store in one transaction. The
    /// buffer is cleared only on success; a failed write keeps every entry
    /// for a later attempt.
    pub async fn flush(&mut self, db: &Database) -> Result<usize> {
        if self.entries.is_empty() {
            return Ok(0);
        }

        let written = db.insert_emotions(self.entries.clone()).await?;
        self.entries.clear();
        Ok(written)
    }
}
