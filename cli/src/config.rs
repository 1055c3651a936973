use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use embedding_store::EmbeddingFormat;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use word2vec::{VectorAggregation, Word2VecConfig};

/// Settings driving the `embed` command.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EmbedSettings {
    /// Whitespace-separated token file.
    #[serde(default = "EmbedSettings::default_corpus")]
    pub corpus: PathBuf,
    #[serde(default = "EmbedSettings::default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub format: EmbeddingFormat,
    #[serde(default)]
    pub aggregation: VectorAggregation,
    /// Optional flamegraph destination collected while training.
    #[serde(default)]
    pub profile_output: Option<PathBuf>,
    #[serde(default)]
    pub word2vec: Word2VecConfig,
}

impl EmbedSettings {
    fn default_corpus() -> PathBuf {
        PathBuf::from("data/corpus.txt")
    }

    fn default_output() -> PathBuf {
        PathBuf::from("embeddings/item.bin")
    }
}

impl Default for EmbedSettings {
    fn default() -> Self {
        Self {
            corpus: Self::default_corpus(),
            output: Self::default_output(),
            format: EmbeddingFormat::default(),
            aggregation: VectorAggregation::default(),
            profile_output: None,
            word2vec: Word2VecConfig::default(),
        }
    }
}

/// Settings powering the `neighbors` command.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NeighborsSettings {
    #[serde(default = "NeighborsSettings::default_embeddings")]
    pub embeddings: PathBuf,
    #[serde(default)]
    pub format: EmbeddingFormat,
    /// Query words; every word in the file is queried when empty.
    #[serde(default)]
    pub words: Vec<String>,
    #[serde(default = "NeighborsSettings::default_k")]
    pub k: usize,
    /// Where the rendered neighbour lists are also written.
    #[serde(default)]
    pub report: Option<PathBuf>,
    #[serde(default)]
    pub profile_output: Option<PathBuf>,
}

impl NeighborsSettings {
    fn default_embeddings() -> PathBuf {
        EmbedSettings::default_output()
    }

    fn default_k() -> usize {
        10
    }
}

impl Default for NeighborsSettings {
    fn default() -> Self {
        Self {
            embeddings: Self::default_embeddings(),
            format: EmbeddingFormat::default(),
            words: Vec::new(),
            k: Self::default_k(),
            report: None,
            profile_output: None,
        }
    }
}

/// Loads TOML settings for the requested command, falling back to defaults when missing.
pub fn load_settings<T>(command: &str, explicit: Option<PathBuf>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let (candidate, explicit_provided) = match explicit {
        Some(path) => (path, true),
        None => (PathBuf::from(format!("{command}.toml")), false),
    };

    if candidate.exists() {
        let raw = std::fs::read_to_string(&candidate).with_context(|| {
            format!(
                "failed to read configuration for `{command}` from {}",
                candidate.display()
            )
        })?;
        let parsed = toml::from_str(&raw).with_context(|| {
            format!(
                "failed to parse TOML configuration for `{command}` at {}",
                candidate.display()
            )
        })?;
        Ok(parsed)
    } else if explicit_provided {
        bail!(
            "configuration file for `{command}` not found at {}",
            candidate.display()
        );
    } else {
        Ok(T::default())
    }
}
