use std::sync::mpsc::SyncSender;
use std::time::Instant;

use datasets::CancelToken;
use tracing::{debug, info};

use crate::Word2VecError;
use crate::config::{CorpusMode, Word2VecConfig};
use crate::dictionary::Dictionary;
use crate::source::TokenSource;

/// Per-id predicates that exclude tokens from training without touching the dictionary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Filters {
    /// `0` disables the upper bound.
    pub max_count: u64,
    pub min_count: u64,
}

impl Filters {
    pub fn skip(&self, id: usize, dictionary: &Dictionary) -> bool {
        let count = dictionary.count(id);
        (self.max_count > 0 && count > self.max_count) || count < self.min_count
    }
}

/// Ingested token stream: the dictionary plus, in memory mode, the id-coded document.
#[derive(Clone, Debug)]
pub struct Corpus {
    dictionary: Dictionary,
    document: Vec<usize>,
    len: usize,
    filters: Filters,
    mode: CorpusMode,
    to_lower: bool,
}

impl Corpus {
    /// Reads `source` once, building the dictionary.
    pub fn load<S>(
        source: &S,
        config: &Word2VecConfig,
        cancel: &CancelToken,
    ) -> Result<Self, Word2VecError>
    where
        S: TokenSource + ?Sized,
    {
        let started = Instant::now();
        let mut dictionary = Dictionary::new();
        let mut document = Vec::new();
        let mut len = 0usize;

        for token in source.open()? {
            cancel.check()?;
            let token = normalize(token?, config.to_lower);
            if token.is_empty() {
                continue;
            }
            let (id, _) = dictionary.add(&token);
            if config.mode == CorpusMode::InMemory {
                document.push(id);
            }
            len += 1;
            if len % config.log_batch == 0 {
                debug!(tokens = len, vocabulary = dictionary.len(), "reading corpus");
            }
        }

        info!(
            tokens = len,
            vocabulary = dictionary.len(),
            mode = ?config.mode,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "corpus loaded"
        );

        Ok(Self {
            dictionary,
            document,
            len,
            filters: Filters {
                max_count: config.max_count,
                min_count: config.min_count,
            },
            mode: config.mode,
            to_lower: config.to_lower,
        })
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Number of tokens read from the source.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Tokens left per epoch once the count filters are applied.
    pub fn trainable_len(&self) -> usize {
        (0..self.dictionary.len())
            .filter(|&id| !self.filters.skip(id, &self.dictionary))
            .map(|id| self.dictionary.count(id) as usize)
            .sum()
    }

    pub fn mode(&self) -> CorpusMode {
        self.mode
    }

    pub fn filters(&self) -> Filters {
        self.filters
    }

    /// The in-memory document with filtered ids removed; empty in streaming mode.
    pub fn indexed_doc(&self) -> Vec<usize> {
        self.document
            .iter()
            .copied()
            .filter(|&id| !self.filters.skip(id, &self.dictionary))
            .collect()
    }

    /// Re-reads `source` and sends filtered ids in batches of `batch_size`.
    ///
    /// The trailing partial batch is sent before returning, and dropping `tx`
    /// closes the channel. Returns early without error once every receiver is gone.
    pub fn batch_words<S>(
        &self,
        source: &S,
        batch_size: usize,
        tx: SyncSender<Vec<usize>>,
        cancel: &CancelToken,
    ) -> Result<(), Word2VecError>
    where
        S: TokenSource + ?Sized,
    {
        let mut batch = Vec::with_capacity(batch_size);
        for token in source.open()? {
            cancel.check()?;
            let token = normalize(token?, self.to_lower);
            let Some(id) = self.dictionary.id(&token) else {
                continue;
            };
            if self.filters.skip(id, &self.dictionary) {
                continue;
            }
            batch.push(id);
            if batch.len() == batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                if tx.send(full).is_err() {
                    return Ok(());
                }
            }
        }
        if !batch.is_empty() {
            let _ = tx.send(batch);
        }
        Ok(())
    }
}

fn normalize(token: String, to_lower: bool) -> String {
    if to_lower {
        token.to_lowercase()
    } else {
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;

    use crate::source::OnceSource;

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn config(mode: CorpusMode) -> Word2VecConfig {
        Word2VecConfig {
            mode,
            min_count: 0,
            ..Word2VecConfig::default()
        }
    }

    #[test]
    fn in_memory_corpus_keeps_id_sequence() {
        let source = tokens("a b a c a b");
        let corpus =
            Corpus::load(&source, &config(CorpusMode::InMemory), &CancelToken::new()).unwrap();

        assert_eq!(corpus.len(), 6);
        assert_eq!(corpus.dictionary().len(), 3);
        assert_eq!(corpus.indexed_doc(), vec![0, 1, 0, 2, 0, 1]);
    }

    #[test]
    fn filters_drop_ids_without_shrinking_dictionary() {
        let source = tokens("a b a c a b");
        let mut cfg = config(CorpusMode::InMemory);
        cfg.max_count = 2;
        cfg.min_count = 2;
        let corpus = Corpus::load(&source, &cfg, &CancelToken::new()).unwrap();

        assert_eq!(corpus.indexed_doc(), vec![1, 1]);
        assert_eq!(corpus.trainable_len(), 2);
        assert_eq!(corpus.len(), 6);
        assert_eq!(corpus.dictionary().len(), 3);
    }

    #[test]
    fn lowercasing_merges_tokens() {
        let source = tokens("Item ITEM item");
        let mut cfg = config(CorpusMode::InMemory);
        cfg.to_lower = true;
        let corpus = Corpus::load(&source, &cfg, &CancelToken::new()).unwrap();
        assert_eq!(corpus.dictionary().len(), 1);
        assert_eq!(corpus.dictionary().count(0), 3);
    }

    #[test]
    fn streaming_batches_cover_the_source() {
        let source = tokens("a b c d e");
        let corpus =
            Corpus::load(&source, &config(CorpusMode::Streaming), &CancelToken::new()).unwrap();
        assert!(corpus.indexed_doc().is_empty());
        assert_eq!(corpus.trainable_len(), 5);

        let (tx, rx) = sync_channel(8);
        corpus
            .batch_words(&source, 2, tx, &CancelToken::new())
            .unwrap();
        let batches: Vec<Vec<usize>> = rx.iter().collect();
        assert_eq!(batches, vec![vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn streaming_requires_replayable_source() {
        let source = OnceSource::new(tokens("a b").into_iter());
        let corpus =
            Corpus::load(&source, &config(CorpusMode::Streaming), &CancelToken::new()).unwrap();
        let (tx, _rx) = sync_channel(1);
        let err = corpus
            .batch_words(&source, 4, tx, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Word2VecError::SourceExhausted));
    }

    #[test]
    fn cancelled_load_stops() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = Corpus::load(&tokens("a"), &config(CorpusMode::InMemory), &cancel).unwrap_err();
        assert!(matches!(err, Word2VecError::Cancelled(_)));
    }
}
