//! Recommendation feature pipeline.
//!
//! Item embeddings are trained from behavior sequences, user and item
//! features are fetched through caches and joined into fixed-layout vectors,
//! and those vectors either feed a [`Fitter`] or are batch-scored by the
//! resulting [`Predictor`].

pub mod assembler;
pub mod context;
pub mod embedding;
mod error;
pub mod layout;
pub mod pipeline;
pub mod provider;
pub mod serving;

pub use assembler::{AssembledVector, AssemblerConfig, FeatureCaches, SampleAssembler, SampleKey};
pub use context::{RunContext, Stage};
pub use embedding::{item_embedding_config, train_item_embedding};
pub use error::{AssemblyError, PipelineError};
pub use layout::{Component, LayoutError, LayoutGuard, SampleInfo, Span, Widths};
pub use pipeline::{
    MismatchPolicy, PipelineConfig, TrainedModel, TrainingSet, collect_training_set, train,
};
pub use provider::{
    BehaviorQuery, FeatureProvider, Fitter, ItemEmbedding, ItemFeaturer, JsonlSamples, PreRanker,
    PreTrainer, Predictor, SampleGenerator, Tensor, UserBehavior, UserFeaturer,
};
pub use serving::ItemScore;
