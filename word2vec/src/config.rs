use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Word2VecError;

/// Context model used to generate training pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelType {
    SkipGram,
    Cbow,
}

impl FromStr for ModelType {
    type Err = Word2VecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skipgram" | "skip-gram" | "skip_gram" => Ok(Self::SkipGram),
            "cbow" => Ok(Self::Cbow),
            _ => Err(Word2VecError::InvalidModel(s.to_string())),
        }
    }
}

impl TryFrom<String> for ModelType {
    type Error = Word2VecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelType> for String {
    fn from(value: ModelType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkipGram => f.write_str("skipgram"),
            Self::Cbow => f.write_str("cbow"),
        }
    }
}

/// Approximation of the full softmax used for each training pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OptimizerType {
    NegativeSampling,
    HierarchicalSoftmax,
}

impl FromStr for OptimizerType {
    type Err = Word2VecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ns" | "negative_sampling" | "negative-sampling" => Ok(Self::NegativeSampling),
            "hs" | "hierarchical_softmax" | "hierarchical-softmax" => {
                Ok(Self::HierarchicalSoftmax)
            }
            _ => Err(Word2VecError::InvalidOptimizer(s.to_string())),
        }
    }
}

impl TryFrom<String> for OptimizerType {
    type Error = Word2VecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OptimizerType> for String {
    fn from(value: OptimizerType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for OptimizerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeSampling => f.write_str("ns"),
            Self::HierarchicalSoftmax => f.write_str("hs"),
        }
    }
}

/// Whether the id-coded corpus is kept in memory or re-read from the source every epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorpusMode {
    #[default]
    InMemory,
    Streaming,
}

/// How the public vector of a token is derived from the trained matrices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorAggregation {
    /// Input (center) row only.
    Input,
    /// Input row plus the negative-sampling context row, when one exists.
    #[default]
    Sum,
}

/// Hyper-parameters of the embedding trainer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Word2VecConfig {
    pub dim: usize,
    pub window: usize,
    pub model: ModelType,
    pub optimizer: OptimizerType,
    pub negative_samples: usize,
    pub unigram_table_size: usize,
    pub iter: usize,
    pub initial_lr: f64,
    pub min_lr: f64,
    /// Number of processed tokens between learning-rate updates.
    pub update_lr_batch: usize,
    /// Subsampling threshold ρ; `0` keeps every token.
    pub subsample_threshold: f64,
    /// Tokens seen more often than this are skipped during training; `0` disables.
    pub max_count: u64,
    /// Tokens seen less often than this are skipped during training.
    pub min_count: u64,
    pub to_lower: bool,
    pub mode: CorpusMode,
    /// Token ids per batch in streaming mode.
    pub batch_size: usize,
    pub workers: usize,
    pub log_batch: usize,
    pub seed: Option<u64>,
}

impl Default for Word2VecConfig {
    fn default() -> Self {
        Self {
            dim: 10,
            window: 5,
            model: ModelType::SkipGram,
            optimizer: OptimizerType::NegativeSampling,
            negative_samples: 5,
            unigram_table_size: 1_000_000,
            iter: 15,
            initial_lr: 0.025,
            min_lr: 0.025 * 1.0e-4,
            update_lr_batch: 100_000,
            subsample_threshold: 1.0e-3,
            max_count: 0,
            min_count: 5,
            to_lower: false,
            mode: CorpusMode::InMemory,
            batch_size: 10_000,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            log_batch: 100_000,
            seed: None,
        }
    }
}

impl Word2VecConfig {
    pub(crate) fn validate(&self) -> Result<(), Word2VecError> {
        let checks: [(bool, &'static str); 9] = [
            (self.dim > 0, "dim must be greater than zero"),
            (self.window > 0, "window must be greater than zero"),
            (self.iter > 0, "iter must be greater than zero"),
            (self.workers > 0, "workers must be greater than zero"),
            (self.batch_size > 0, "batch_size must be greater than zero"),
            (
                self.update_lr_batch > 0 && self.log_batch > 0,
                "update_lr_batch and log_batch must be greater than zero",
            ),
            (
                self.initial_lr > 0.0 && self.min_lr >= 0.0 && self.min_lr <= self.initial_lr,
                "learning rates must satisfy 0 <= min_lr <= initial_lr and initial_lr > 0",
            ),
            (
                self.subsample_threshold >= 0.0,
                "subsample_threshold must not be negative",
            ),
            (
                self.optimizer != OptimizerType::NegativeSampling
                    || (self.negative_samples > 0 && self.unigram_table_size > 0),
                "negative sampling needs negative_samples and unigram_table_size above zero",
            ),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, reason)) => Err(Word2VecError::InvalidConfiguration(reason)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("skipgram", ModelType::SkipGram)]
    #[case("Skip-Gram", ModelType::SkipGram)]
    #[case("cbow", ModelType::Cbow)]
    fn model_names_parse(#[case] name: &str, #[case] expected: ModelType) {
        assert_eq!(name.parse::<ModelType>().unwrap(), expected);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = "glove".parse::<ModelType>().unwrap_err();
        assert!(err.to_string().starts_with("invalid model"));
        let err = "adam".parse::<OptimizerType>().unwrap_err();
        assert!(err.to_string().starts_with("invalid optimizer"));
    }

    #[test]
    fn toml_config_rejects_bad_optimizer() {
        let err = toml::from_str::<Word2VecConfig>("optimizer = \"sgd\"").unwrap_err();
        assert!(err.to_string().contains("invalid optimizer"));

        let parsed: Word2VecConfig =
            toml::from_str("model = \"cbow\"\noptimizer = \"hs\"\ndim = 4").unwrap();
        assert_eq!(parsed.model, ModelType::Cbow);
        assert_eq!(parsed.optimizer, OptimizerType::HierarchicalSoftmax);
        assert_eq!(parsed.dim, 4);
        assert_eq!(parsed.window, Word2VecConfig::default().window);
    }

    #[test]
    fn validation_catches_zero_dimensions() {
        let config = Word2VecConfig {
            dim: 0,
            ..Word2VecConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Word2VecError::InvalidConfiguration(_))
        ));
        assert!(Word2VecConfig::default().validate().is_ok());
    }
}
