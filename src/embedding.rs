use embedding_store::EmbeddingMap;
use tracing::{info, instrument, warn};
use word2vec::{
    CorpusMode, ModelType, OnceSource, OptimizerType, VectorAggregation, Word2Vec, Word2VecConfig,
};

use crate::assembler::ITEM_EMBEDDING_DIM;
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::provider::ItemEmbedding;

pub const ITEM_EMBEDDING_WINDOW: usize = 5;

/// Skip-gram with hierarchical softmax over item sequences, one epoch.
pub fn item_embedding_config() -> Word2VecConfig {
    Word2VecConfig {
        dim: ITEM_EMBEDDING_DIM,
        window: ITEM_EMBEDDING_WINDOW,
        iter: 1,
        model: ModelType::SkipGram,
        optimizer: OptimizerType::HierarchicalSoftmax,
        min_count: 0,
        mode: CorpusMode::InMemory,
        ..Word2VecConfig::default()
    }
}

/// Trains item vectors from the provider's behavior-ordered item sequence.
///
/// The sequence is consumed once, so training always keeps the corpus in memory.
#[instrument(skip_all, fields(dim = config.dim, window = config.window))]
pub fn train_item_embedding(
    ctx: &RunContext,
    source: &dyn ItemEmbedding,
    config: &Word2VecConfig,
) -> Result<EmbeddingMap, PipelineError> {
    let mut config = config.clone();
    if config.mode == CorpusMode::Streaming {
        warn!("item sequence cannot be replayed, training in memory");
        config.mode = CorpusMode::InMemory;
    }
    let mut trainer = Word2Vec::new(config)?;
    let sequence = source
        .item_sequence(ctx)
        .map_err(PipelineError::ItemSequence)?;
    trainer.train(&OnceSource::new(sequence), ctx.cancel())?;

    let map = trainer.embedding_map(VectorAggregation::Sum)?;
    info!(items = map.len(), "item embedding trained");
    Ok(map)
}
