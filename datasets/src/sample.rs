use serde::{Deserialize, Serialize};

/// Unit of supervision emitted by a sample generator.
///
/// `timestamp` bounds the user behaviour visible while assembling the sample, so
/// training never sees interactions that happened after the label.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub user_id: u64,
    pub item_id: u64,
    pub label: f64,
    #[serde(default)]
    pub timestamp: i64,
}

impl Sample {
    pub fn new(user_id: u64, item_id: u64, label: f64, timestamp: i64) -> Self {
        Self {
            user_id,
            item_id,
            label,
            timestamp,
        }
    }
}
