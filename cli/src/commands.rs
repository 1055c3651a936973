use std::fs::{self, File};
use std::path::Path;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use datasets::CancelToken;
use embedding_store::{EmbeddingMap, Neighbor};
use tracing::{info, instrument, warn};
use word2vec::{TextFileSource, Word2Vec};

use crate::config::{EmbedSettings, NeighborsSettings, load_settings};
use crate::telemetry::{init_telemetry, write_profile};

pub fn run_embed(config_path: Option<PathBuf>) -> Result<()> {
    let settings = load_settings::<EmbedSettings>("embed", config_path)?;
    let profiler_guard = init_telemetry(settings.profile_output.is_some());

    let map = embed(&settings, &CancelToken::new())?;
    println!(
        "{} vectors of dimension {} written to {}",
        map.len(),
        map.dimension(),
        settings.output.display()
    );

    if let (Some(guard), Some(profile_path)) = (profiler_guard, &settings.profile_output) {
        ensure_parent(profile_path)?;
        write_profile(guard, profile_path);
        println!("CPU profile written to {}", profile_path.display());
    }
    Ok(())
}

pub fn run_neighbors(config_path: Option<PathBuf>) -> Result<()> {
    let settings = load_settings::<NeighborsSettings>("neighbors", config_path)?;
    let profiler_guard = init_telemetry(settings.profile_output.is_some());

    let results = neighbors(&settings)?;
    let rendered = render_neighbors(&results);
    println!("{rendered}");
    if let Some(report) = &settings.report {
        write_text_file(report, &rendered)?;
        println!("Neighbour report written to {}", report.display());
    }

    if let (Some(guard), Some(profile_path)) = (profiler_guard, &settings.profile_output) {
        ensure_parent(profile_path)?;
        write_profile(guard, profile_path);
        println!("CPU profile written to {}", profile_path.display());
    }
    Ok(())
}

/// Trains vectors over the configured corpus and saves them.
#[instrument(skip_all, fields(corpus = %settings.corpus.display()))]
fn embed(settings: &EmbedSettings, cancel: &CancelToken) -> Result<EmbeddingMap> {
    if !settings.corpus.exists() {
        bail!("corpus not found at {}", settings.corpus.display());
    }
    let mut trainer = Word2Vec::new(settings.word2vec.clone())?;
    trainer
        .train(&TextFileSource::new(&settings.corpus), cancel)
        .with_context(|| format!("failed to train on {}", settings.corpus.display()))?;
    let map = trainer.embedding_map(settings.aggregation)?;

    ensure_parent(&settings.output)?;
    let file = File::create(&settings.output)
        .with_context(|| format!("failed to create {}", settings.output.display()))?;
    map.save(file, settings.format)
        .with_context(|| format!("failed to write {}", settings.output.display()))?;
    info!(words = map.len(), format = ?settings.format, "embeddings saved");
    Ok(map)
}

/// Neighbour lists for the configured words; `None` marks an unknown word.
fn neighbors(settings: &NeighborsSettings) -> Result<Vec<(String, Option<Vec<Neighbor>>)>> {
    let file = File::open(&settings.embeddings)
        .with_context(|| format!("failed to open {}", settings.embeddings.display()))?;
    let map = EmbeddingMap::load(file, settings.format)
        .with_context(|| format!("failed to read {}", settings.embeddings.display()))?;

    let words = if settings.words.is_empty() {
        map.sorted_words().into_iter().map(str::to_string).collect()
    } else {
        settings.words.clone()
    };
    Ok(words
        .into_iter()
        .map(|word| {
            let hits = map.neighbors(&word, settings.k);
            if hits.is_none() {
                warn!(word = word.as_str(), "word not in embeddings");
            }
            (word, hits)
        })
        .collect())
}

fn render_neighbors(results: &[(String, Option<Vec<Neighbor>>)]) -> String {
    results
        .iter()
        .map(|(word, hits)| match hits {
            Some(hits) => {
                let list: Vec<String> = hits.iter().map(Neighbor::to_string).collect();
                format!("{word}: {}", list.join(", "))
            }
            None => format!("{word}: <unknown>"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_text_file(path: &Path, contents: &str) -> Result<()> {
    ensure_parent(path)?;
    let mut body = contents.to_string();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedding_store::EmbeddingFormat;
    use word2vec::Word2VecConfig;

    fn small_config() -> Word2VecConfig {
        Word2VecConfig {
            dim: 4,
            window: 2,
            iter: 2,
            min_count: 0,
            workers: 1,
            seed: Some(11),
            ..Word2VecConfig::default()
        }
    }

    #[test]
    fn embed_then_query_neighbors() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.txt");
        fs::write(&corpus, "a b c d\nb c d a\nc d a b\n").unwrap();

        let embed_settings = EmbedSettings {
            corpus,
            output: dir.path().join("out/vectors.txt"),
            format: EmbeddingFormat::Text,
            word2vec: small_config(),
            ..EmbedSettings::default()
        };
        let map = embed(&embed_settings, &CancelToken::new()).unwrap();
        assert_eq!(map.len(), 4);
        assert!(embed_settings.output.exists());

        let settings = NeighborsSettings {
            embeddings: embed_settings.output.clone(),
            format: EmbeddingFormat::Text,
            words: vec!["a".to_string(), "zzz".to_string()],
            k: 2,
            ..NeighborsSettings::default()
        };
        let results = neighbors(&settings).unwrap();
        assert_eq!(results.len(), 2);
        let hits = results[0].1.as_ref().expect("known word");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|hit| hit.word != "a"));
        assert!(results[1].1.is_none());

        let rendered = render_neighbors(&results);
        assert!(rendered.lines().nth(1).unwrap().ends_with("<unknown>"));
    }

    #[test]
    fn missing_corpus_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let settings = EmbedSettings {
            corpus: dir.path().join("absent.txt"),
            output: dir.path().join("vectors.bin"),
            ..EmbedSettings::default()
        };
        let err = embed(&settings, &CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("corpus not found"));
    }

    #[test]
    fn write_text_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/nested/neighbors.txt");
        write_text_file(&path, "a: b (1.0000)").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a: b (1.0000)\n");
    }
}
