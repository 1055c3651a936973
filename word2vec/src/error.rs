use datasets::Cancelled;
use embedding_store::EmbeddingError;
use thiserror::Error;

/// Errors raised while configuring or running the embedding trainer.
#[derive(Debug, Error)]
pub enum Word2VecError {
    #[error("invalid model: {0} not in cbow|skipgram")]
    InvalidModel(String),
    #[error("invalid optimizer: {0} not in hs|ns")]
    InvalidOptimizer(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    /// The token source failed while being read.
    #[error("token source failed: {0}")]
    Io(#[from] std::io::Error),
    /// A one-shot token source was opened a second time.
    #[error("token source cannot be replayed")]
    SourceExhausted,
    #[error("corpus contains no tokens")]
    EmptyCorpus,
    #[error("embeddings requested before training finished")]
    NotTrained,
    #[error("training worker panicked")]
    WorkerPanicked,
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}
