//! Collaborator interfaces the pipeline calls into, and the capability set
//! that bundles them.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use datasets::{MmapSamples, Sample};
use feature_cache::UserBehaviorCache;
use ndarray::{Array1, Array2};

use crate::context::RunContext;
use crate::pipeline::TrainingSet;

pub type Tensor = Vec<f64>;

pub trait UserFeaturer: Send + Sync {
    fn user_feature(&self, ctx: &RunContext, user: u64) -> Result<Tensor>;
}

pub trait ItemFeaturer: Send + Sync {
    fn item_feature(&self, ctx: &RunContext, item: u64) -> Result<Tensor>;
}

/// Bounds applied to a behavior lookup. `None` means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BehaviorQuery {
    /// Maximum number of items returned; `0` means unbounded.
    pub max_len: usize,
    pub max_pk: Option<i64>,
    /// Latest timestamp that may be returned. Training lookups set this to the
    /// sample's own timestamp.
    pub max_ts: Option<i64>,
}

/// Item ids a user interacted with, newest first.
pub trait UserBehavior: Send + Sync {
    fn user_behavior(&self, ctx: &RunContext, user: u64, query: BehaviorQuery) -> Result<Vec<u64>>;
}

/// Behavior-ordered item tokens used to train item embeddings.
pub trait ItemEmbedding: Send + Sync {
    fn item_sequence(
        &self,
        ctx: &RunContext,
    ) -> Result<Box<dyn Iterator<Item = String> + Send + '_>>;
}

pub trait SampleGenerator: Send + Sync {
    fn samples(
        &self,
        ctx: &RunContext,
    ) -> Result<Box<dyn Iterator<Item = Result<Sample>> + Send + '_>>;
}

pub trait Predictor: Send + Sync {
    /// One score per row of `features`.
    fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>>;
}

pub trait Fitter {
    fn fit(&self, train: &TrainingSet) -> Result<Box<dyn Predictor>>;
}

pub trait PreTrainer: Send + Sync {
    fn pre_train(&self, ctx: &RunContext) -> Result<()>;
}

pub trait PreRanker: Send + Sync {
    fn pre_rank(&self, ctx: &RunContext) -> Result<()>;
}

/// Collaborators available to a run. User and item features are required;
/// everything else is an optional capability.
#[derive(Clone)]
pub struct FeatureProvider {
    pub users: Arc<dyn UserFeaturer>,
    pub items: Arc<dyn ItemFeaturer>,
    pub samples: Option<Arc<dyn SampleGenerator>>,
    pub item_embedding: Option<Arc<dyn ItemEmbedding>>,
    pub user_behavior: Option<Arc<dyn UserBehavior>>,
    pub pre_trainer: Option<Arc<dyn PreTrainer>>,
    pub pre_ranker: Option<Arc<dyn PreRanker>>,
}

impl FeatureProvider {
    pub fn new(users: Arc<dyn UserFeaturer>, items: Arc<dyn ItemFeaturer>) -> Self {
        Self {
            users,
            items,
            samples: None,
            item_embedding: None,
            user_behavior: None,
            pre_trainer: None,
            pre_ranker: None,
        }
    }

    pub fn with_samples(mut self, samples: Arc<dyn SampleGenerator>) -> Self {
        self.samples = Some(samples);
        self
    }

    pub fn with_item_embedding(mut self, source: Arc<dyn ItemEmbedding>) -> Self {
        self.item_embedding = Some(source);
        self
    }

    pub fn with_user_behavior(mut self, behavior: Arc<dyn UserBehavior>) -> Self {
        self.user_behavior = Some(behavior);
        self
    }

    pub fn with_pre_trainer(mut self, hook: Arc<dyn PreTrainer>) -> Self {
        self.pre_trainer = Some(hook);
        self
    }

    pub fn with_pre_ranker(mut self, hook: Arc<dyn PreRanker>) -> Self {
        self.pre_ranker = Some(hook);
        self
    }
}

impl UserBehavior for UserBehaviorCache {
    fn user_behavior(
        &self,
        _ctx: &RunContext,
        user: u64,
        query: BehaviorQuery,
    ) -> Result<Vec<u64>> {
        let seq = self.get(user, query.max_ts.unwrap_or(0), query.max_len)?;
        Ok(seq.into_items())
    }
}

/// Training samples read from a JSON-lines file.
pub struct JsonlSamples {
    file: MmapSamples,
}

impl JsonlSamples {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            file: MmapSamples::open(path)?,
        })
    }
}

impl SampleGenerator for JsonlSamples {
    fn samples(
        &self,
        _ctx: &RunContext,
    ) -> Result<Box<dyn Iterator<Item = Result<Sample>> + Send + '_>> {
        Ok(Box::new(self.file.iter()?))
    }
}
