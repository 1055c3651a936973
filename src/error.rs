use datasets::Cancelled;
use thiserror::Error;
use word2vec::Word2VecError;

use crate::layout::LayoutError;

/// Failure to build one feature vector.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("user {user} feature unavailable")]
    UserFeature {
        user: u64,
        #[source]
        source: anyhow::Error,
    },
    #[error("item {item} feature unavailable")]
    ItemFeature {
        item: u64,
        #[source]
        source: anyhow::Error,
    },
    #[error("user {user} behavior unavailable")]
    UserBehavior {
        user: u64,
        #[source]
        source: anyhow::Error,
    },
    #[error("item embedding dimension {found} does not match configured {expected}")]
    EmbeddingDimension { expected: usize, found: usize },
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Errors returned by the training and serving entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfiguration(String),
    #[error("feature provider has no sample generator")]
    MissingSampleGenerator,
    #[error("pre-train hook failed")]
    PreTrain(#[source] anyhow::Error),
    #[error("pre-rank hook failed")]
    PreRank(#[source] anyhow::Error),
    #[error("item sequence unavailable")]
    ItemSequence(#[source] anyhow::Error),
    #[error("sample generator failed")]
    Samples(#[source] anyhow::Error),
    /// The first sample could not be assembled, so no layout could be established.
    #[error("first sample failed to assemble")]
    FirstSample(#[source] AssemblyError),
    #[error("no sample could be assembled")]
    NoSamples,
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("fitting failed")]
    Fit(#[source] anyhow::Error),
    #[error("prediction failed")]
    Predict(#[source] anyhow::Error),
    #[error("predictor returned {found} scores for {expected} rows")]
    PredictionShape { expected: usize, found: usize },
    #[error("training matrix shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Embedding(Word2VecError),
    #[error(transparent)]
    Assembly(AssemblyError),
    #[error("assembler worker panicked")]
    WorkerPanicked,
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl From<AssemblyError> for PipelineError {
    fn from(err: AssemblyError) -> Self {
        match err {
            AssemblyError::Cancelled(cancelled) => Self::Cancelled(cancelled),
            other => Self::Assembly(other),
        }
    }
}

impl From<Word2VecError> for PipelineError {
    fn from(err: Word2VecError) -> Self {
        match err {
            Word2VecError::Cancelled(cancelled) => Self::Cancelled(cancelled),
            other => Self::Embedding(other),
        }
    }
}
