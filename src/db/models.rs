use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A classified sample on its way into the store: capture time in Unix epoch
/// seconds and the label reported by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionRecord {
    pub timestamp: f64,
    pub emotion: String,
}

/// A persisted row with its storage bookkeeping, as returned by export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmotion {
    pub id: i64,
    pub timestamp: f64,
    pub emotion: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionCount {
    pub emotion: String,
    pub count: u64,
}

/// One (day, emotion) bucket of the daily distribution. `percentage` is the
/// emotion's share of that day's samples, rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionStat {
    pub date: String,
    pub emotion: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MostRecent {
    pub emotion: Option<String>,
    pub timestamp: Option<f64>,
}

/// First and last day covered by the store, as `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionSummary {
    pub total_emotions_recorded: u64,
    pub emotion_distribution: BTreeMap<String, DistributionEntry>,
    pub most_recent: MostRecent,
    pub date_range: DateRange,
}
