//! Feature caches shared by the training and serving paths.

pub mod behavior;
pub mod cache;
pub mod config;

pub use behavior::{BehaviorError, TimeSeq, UserBehaviorCache};
pub use cache::FeatureCache;
pub use config::CacheConfig;
