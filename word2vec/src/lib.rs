//! Word2vec embedding trainer.
//!
//! A [`Corpus`] is read from a [`TokenSource`], then [`Word2Vec`] trains
//! skip-gram or CBOW vectors with negative sampling or hierarchical softmax
//! across a pool of worker threads that update one shared matrix without locks.
//! The result is frozen into an [`EmbeddingMap`](embedding_store::EmbeddingMap).

pub mod config;
pub mod context;
pub mod corpus;
pub mod dictionary;
mod error;
pub mod matrix;
pub mod optimizer;
pub mod schedule;
pub mod source;
pub mod subsample;
pub mod trainer;

pub use config::{CorpusMode, ModelType, OptimizerType, VectorAggregation, Word2VecConfig};
pub use corpus::{Corpus, Filters};
pub use dictionary::Dictionary;
pub use error::Word2VecError;
pub use schedule::LinearDecay;
pub use source::{OnceSource, TextFileSource, TokenSource, Tokens};
pub use subsample::Subsampler;
pub use trainer::{TrainerState, Word2Vec};
