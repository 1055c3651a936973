use std::io::Write;

use approx::assert_relative_eq;
use datasets::CancelToken;
use embedding_store::{EmbeddingFormat, EmbeddingMap};
use rstest::rstest;
use word2vec::{
    CorpusMode, ModelType, OptimizerType, TextFileSource, VectorAggregation, Word2Vec,
    Word2VecConfig,
};

fn repeated_corpus() -> Vec<String> {
    ["1", "2", "3", "1", "2", "3", "1", "2", "3"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn small_config(model: ModelType, optimizer: OptimizerType) -> Word2VecConfig {
    Word2VecConfig {
        dim: 4,
        window: 1,
        iter: 1,
        negative_samples: 2,
        model,
        optimizer,
        min_count: 0,
        subsample_threshold: 0.0,
        workers: 2,
        seed: Some(7),
        ..Word2VecConfig::default()
    }
}

/// Input rows as initialised for `config`: a learning rate too small to move any weight.
fn initial_vectors(config: &Word2VecConfig) -> EmbeddingMap {
    let frozen = Word2VecConfig {
        initial_lr: 1e-300,
        min_lr: 0.0,
        ..config.clone()
    };
    let mut w2v = Word2Vec::new(frozen).unwrap();
    w2v.train(&repeated_corpus(), &CancelToken::new()).unwrap();
    w2v.embedding_map(VectorAggregation::Input).unwrap()
}

#[rstest]
#[case(ModelType::SkipGram, OptimizerType::NegativeSampling)]
#[case(ModelType::SkipGram, OptimizerType::HierarchicalSoftmax)]
#[case(ModelType::Cbow, OptimizerType::NegativeSampling)]
#[case(ModelType::Cbow, OptimizerType::HierarchicalSoftmax)]
fn tiny_corpus_yields_one_vector_per_token(
    #[case] model: ModelType,
    #[case] optimizer: OptimizerType,
) {
    let config = Word2VecConfig {
        workers: 1,
        ..small_config(model, optimizer)
    };
    let mut w2v = Word2Vec::new(config.clone()).unwrap();
    w2v.train(&repeated_corpus(), &CancelToken::new()).unwrap();

    let map = w2v.embedding_map(VectorAggregation::Sum).unwrap();
    assert_eq!(map.len(), 3);
    assert_eq!(map.dimension(), 4);
    for word in ["1", "2", "3"] {
        let vector = map.get(word).expect("token embedded");
        assert_eq!(vector.len(), 4);
        assert!(vector.iter().any(|v| *v != 0.0), "{word} is all zeros");
    }

    let trained = w2v.embedding_map(VectorAggregation::Input).unwrap();
    let initial = initial_vectors(&config);
    for word in ["1", "2", "3"] {
        assert_ne!(trained.get(word), initial.get(word), "{word} never updated");
    }
}

#[test]
fn trained_map_survives_save_and_load() {
    let config = small_config(ModelType::SkipGram, OptimizerType::NegativeSampling);
    let mut w2v = Word2Vec::new(config).unwrap();
    w2v.train(&repeated_corpus(), &CancelToken::new()).unwrap();
    let map = w2v.embedding_map(VectorAggregation::Sum).unwrap();

    let mut bytes = Vec::new();
    map.save(&mut bytes, EmbeddingFormat::Binary).unwrap();
    let restored = EmbeddingMap::load(bytes.as_slice(), EmbeddingFormat::Binary).unwrap();

    for (word, vector) in map.iter() {
        for (a, b) in vector.iter().zip(restored.get(word).unwrap()) {
            assert_relative_eq!(a, b);
        }
    }
}

#[test]
fn streaming_text_file_corpus() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for _ in 0..50 {
        writeln!(file, "apple banana cherry apple").unwrap();
    }

    let mut w2v = Word2Vec::new(Word2VecConfig {
        mode: CorpusMode::Streaming,
        batch_size: 16,
        ..small_config(ModelType::SkipGram, OptimizerType::NegativeSampling)
    })
    .unwrap();
    w2v.train(&TextFileSource::new(file.path()), &CancelToken::new()).unwrap();

    let map = w2v.embedding_map(VectorAggregation::Input).unwrap();
    assert_eq!(map.sorted_words(), vec!["apple", "banana", "cherry"]);
}
