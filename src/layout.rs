//! Fixed column layout of assembled feature vectors.
//!
//! Every vector is `user profile | user behavior | item embedding | context
//! feature`. The first assembled sample fixes the width of each part and every
//! later vector must match it exactly.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Half-open `[start, end)` column range, stored as a two-element array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[usize; 2]", into = "[usize; 2]")]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn width(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<[usize; 2]> for Span {
    fn from([start, end]: [usize; 2]) -> Self {
        Self { start, end }
    }
}

impl From<Span> for [usize; 2] {
    fn from(span: Span) -> Self {
        [span.start, span.end]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    UserProfile,
    UserBehavior,
    ItemEmbedding,
    ContextFeature,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UserProfile => "user profile",
            Self::UserBehavior => "user behavior",
            Self::ItemEmbedding => "item embedding",
            Self::ContextFeature => "context feature",
        })
    }
}

/// Widths of the four parts of one assembled vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Widths {
    pub user: usize,
    pub behavior: usize,
    pub item_embedding: usize,
    pub item: usize,
}

impl Widths {
    pub fn total(&self) -> usize {
        self.user + self.behavior + self.item_embedding + self.item
    }

    fn components(&self) -> [(Component, usize); 4] {
        [
            (Component::UserProfile, self.user),
            (Component::UserBehavior, self.behavior),
            (Component::ItemEmbedding, self.item_embedding),
            (Component::ContextFeature, self.item),
        ]
    }
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("{component} width mismatch: expected {expected}, found {found}")]
    WidthMismatch {
        component: Component,
        expected: usize,
        found: usize,
    },
    #[error("{component} range [{start}, {end}) should start at column {expected_start}")]
    NotContiguous {
        component: Component,
        start: usize,
        end: usize,
        expected_start: usize,
    },
    #[error("sample info io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sample info json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SampleInfoRecord")]
pub struct SampleInfo {
    pub user_profile_range: Span,
    pub user_behavior_range: Span,
    pub item_feature_range: Span,
    pub ctx_feature_range: Span,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SampleInfoRecord {
    user_profile_range: Span,
    user_behavior_range: Span,
    item_feature_range: Span,
    ctx_feature_range: Span,
}

impl TryFrom<SampleInfoRecord> for SampleInfo {
    type Error = LayoutError;

    fn try_from(record: SampleInfoRecord) -> Result<Self, Self::Error> {
        let info = SampleInfo {
            user_profile_range: record.user_profile_range,
            user_behavior_range: record.user_behavior_range,
            item_feature_range: record.item_feature_range,
            ctx_feature_range: record.ctx_feature_range,
        };
        info.validate()?;
        Ok(info)
    }
}

impl SampleInfo {
    pub fn from_widths(widths: Widths) -> Self {
        let user = Span {
            start: 0,
            end: widths.user,
        };
        let behavior = Span {
            start: user.end,
            end: user.end + widths.behavior,
        };
        let embedding = Span {
            start: behavior.end,
            end: behavior.end + widths.item_embedding,
        };
        let ctx = Span {
            start: embedding.end,
            end: embedding.end + widths.item,
        };
        Self {
            user_profile_range: user,
            user_behavior_range: behavior,
            item_feature_range: embedding,
            ctx_feature_range: ctx,
        }
    }

    pub fn widths(&self) -> Widths {
        Widths {
            user: self.user_profile_range.width(),
            behavior: self.user_behavior_range.width(),
            item_embedding: self.item_feature_range.width(),
            item: self.ctx_feature_range.width(),
        }
    }

    /// Total vector width.
    pub fn width(&self) -> usize {
        self.ctx_feature_range.end
    }

    /// Ranges must tile `[0, width)` in component order.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let spans = [
            (Component::UserProfile, self.user_profile_range),
            (Component::UserBehavior, self.user_behavior_range),
            (Component::ItemEmbedding, self.item_feature_range),
            (Component::ContextFeature, self.ctx_feature_range),
        ];
        let mut cursor = 0;
        for (component, span) in spans {
            if span.start != cursor || span.end < span.start {
                return Err(LayoutError::NotContiguous {
                    component,
                    start: span.start,
                    end: span.end,
                    expected_start: cursor,
                });
            }
            cursor = span.end;
        }
        Ok(())
    }

    /// Compares `widths` part by part, reporting the first mismatch.
    pub fn check(&self, widths: Widths) -> Result<(), LayoutError> {
        for ((component, expected), (_, found)) in
            self.widths().components().into_iter().zip(widths.components())
        {
            if expected != found {
                return Err(LayoutError::WidthMismatch {
                    component,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), LayoutError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Establishes the layout from the first observed vector and validates the rest.
#[derive(Clone, Debug, Default)]
pub struct LayoutGuard {
    info: Option<SampleInfo>,
}

impl LayoutGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn established(info: SampleInfo) -> Self {
        Self { info: Some(info) }
    }

    pub fn info(&self) -> Option<SampleInfo> {
        self.info
    }

    pub fn observe(&mut self, widths: Widths) -> Result<SampleInfo, LayoutError> {
        match self.info {
            Some(info) => {
                info.check(widths)?;
                Ok(info)
            }
            None => {
                let info = SampleInfo::from_widths(widths);
                self.info = Some(info);
                Ok(info)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widths(user: usize) -> Widths {
        Widths {
            user,
            behavior: 100,
            item_embedding: 10,
            item: 3,
        }
    }

    #[test]
    fn ranges_are_contiguous() {
        let info = SampleInfo::from_widths(widths(5));
        assert_eq!(info.user_profile_range, Span { start: 0, end: 5 });
        assert_eq!(info.user_behavior_range, Span { start: 5, end: 105 });
        assert_eq!(info.item_feature_range, Span { start: 105, end: 115 });
        assert_eq!(info.ctx_feature_range, Span { start: 115, end: 118 });
        assert_eq!(info.width(), widths(5).total());
        assert_eq!(info.widths(), widths(5));
    }

    #[test]
    fn guard_rejects_later_mismatch() {
        let mut guard = LayoutGuard::new();
        let first = guard.observe(widths(5)).unwrap();
        assert_eq!(guard.observe(widths(5)).unwrap(), first);

        let err = guard.observe(widths(6)).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::WidthMismatch {
                component: Component::UserProfile,
                expected: 5,
                found: 6
            }
        ));
        assert_eq!(guard.info(), Some(first));
    }

    #[test]
    fn sample_info_json_uses_pairs() {
        let info = SampleInfo::from_widths(widths(2));
        let json = serde_json::to_value(info).unwrap();
        assert_eq!(json["userProfileRange"], serde_json::json!([0, 2]));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample_info.json");
        info.save(&path).unwrap();
        assert_eq!(SampleInfo::load(&path).unwrap(), info);
    }

    #[test]
    fn gapped_sidecar_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample_info.json");
        std::fs::write(
            &path,
            r#"{"userProfileRange":[0,2],"userBehaviorRange":[2,2],"itemFeatureRange":[5,15],"ctxFeatureRange":[15,16]}"#,
        )
        .unwrap();

        let err = SampleInfo::load(&path).unwrap_err();
        assert!(err.to_string().contains("item embedding range [5, 15)"));
    }

    #[test]
    fn inverted_span_fails_validation() {
        let mut info = SampleInfo::from_widths(widths(2));
        info.ctx_feature_range = Span { start: 112, end: 110 };
        assert_eq!(info.ctx_feature_range.width(), 0);
        assert!(matches!(
            info.validate(),
            Err(LayoutError::NotContiguous {
                component: Component::ContextFeature,
                expected_start: 112,
                ..
            })
        ));
        assert!(SampleInfo::from_widths(widths(2)).validate().is_ok());
    }
}
