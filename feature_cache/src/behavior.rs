use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BehaviorError {
    #[error("user {0} not found")]
    UserNotFound(u64),
    #[error("behavior has {timestamps} timestamps but {items} items")]
    LengthMismatch { timestamps: usize, items: usize },
}

/// One user's interactions as parallel arrays, newest first.
///
/// Both arrays always have the same length.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TimeSeqRecord")]
pub struct TimeSeq {
    ts: Vec<i64>,
    items: Vec<u64>,
}

#[derive(Deserialize)]
struct TimeSeqRecord {
    ts: Vec<i64>,
    items: Vec<u64>,
}

impl TryFrom<TimeSeqRecord> for TimeSeq {
    type Error = BehaviorError;

    fn try_from(record: TimeSeqRecord) -> Result<Self, Self::Error> {
        TimeSeq::new(record.ts, record.items)
    }
}

impl TimeSeq {
    /// Builds a sequence from unordered pairs, sorting them by descending timestamp.
    pub fn new(ts: Vec<i64>, items: Vec<u64>) -> Result<Self, BehaviorError> {
        if ts.len() != items.len() {
            return Err(BehaviorError::LengthMismatch {
                timestamps: ts.len(),
                items: items.len(),
            });
        }
        let mut pairs: Vec<(i64, u64)> = ts.into_iter().zip(items).collect();
        pairs.sort_by(|a, b| b.0.cmp(&a.0));
        let (ts, items) = pairs.into_iter().unzip();
        Ok(Self { ts, items })
    }

    pub fn ts(&self) -> &[i64] {
        &self.ts
    }

    pub fn items(&self) -> &[u64] {
        &self.items
    }

    pub fn into_items(self) -> Vec<u64> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.ts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ts.is_empty()
    }

    /// Contiguous window starting at the first entry with `ts <= max_ts`.
    ///
    /// `max_ts == 0` starts at the newest entry; `max_len == 0` does not truncate.
    pub fn filter(&self, max_ts: i64, max_len: usize) -> TimeSeq {
        let start = if max_ts == 0 {
            0
        } else {
            self.ts
                .iter()
                .position(|&ts| ts <= max_ts)
                .unwrap_or(self.ts.len())
        };
        let end = if max_len == 0 {
            self.ts.len()
        } else {
            (start + max_len).min(self.ts.len())
        };
        TimeSeq {
            ts: self.ts[start..end].to_vec(),
            items: self.items[start..end].to_vec(),
        }
    }
}

/// In-memory store of per-user behavior sequences.
#[derive(Debug, Default)]
pub struct UserBehaviorCache {
    users: RwLock<HashMap<u64, TimeSeq>>,
}

impl UserBehaviorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user: u64, behavior: TimeSeq) {
        self.users.write().insert(user, behavior);
    }

    pub fn batch_set<I>(&self, behaviors: I)
    where
        I: IntoIterator<Item = (u64, TimeSeq)>,
    {
        self.users.write().extend(behaviors);
    }

    pub fn delete(&self, user: u64) -> bool {
        self.users.write().remove(&user).is_some()
    }

    pub fn clear(&self) {
        self.users.write().clear();
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    pub fn get(
        &self,
        user: u64,
        max_ts: i64,
        max_len: usize,
    ) -> Result<TimeSeq, BehaviorError> {
        self.users
            .read()
            .get(&user)
            .map(|seq| seq.filter(max_ts, max_len))
            .ok_or(BehaviorError::UserNotFound(user))
    }
}
