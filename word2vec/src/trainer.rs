use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;
use std::time::Instant;

use datasets::{CancelToken, Cancelled};
use embedding_store::EmbeddingMap;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, instrument};

use crate::Word2VecError;
use crate::config::{CorpusMode, VectorAggregation, Word2VecConfig};
use crate::context::{self, ContextModel, Scratch};
use crate::corpus::Corpus;
use crate::dictionary::Dictionary;
use crate::matrix::Matrix;
use crate::optimizer::{self, Optimizer};
use crate::schedule::LinearDecay;
use crate::source::TokenSource;
use crate::subsample::Subsampler;

const PROGRESS_CHUNK: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainerState {
    Idle,
    Initialized,
    Training,
    Done,
}

struct Trained {
    corpus: Corpus,
    params: Matrix,
    optimizer: Box<dyn Optimizer>,
}

/// Word2vec embedding trainer over an arbitrary token source.
pub struct Word2Vec {
    config: Word2VecConfig,
    state: TrainerState,
    trained: Option<Trained>,
}

/// Everything a worker reads during one epoch.
struct Epoch<'a> {
    index: usize,
    config: &'a Word2VecConfig,
    params: &'a Matrix,
    optimizer: &'a dyn Optimizer,
    model: &'a dyn ContextModel,
    subsampler: &'a Subsampler,
    schedule: &'a LinearDecay,
    lr: &'a AtomicU64,
    processed_before: usize,
    cancel: &'a CancelToken,
}

impl Word2Vec {
    pub fn new(config: Word2VecConfig) -> Result<Self, Word2VecError> {
        config.validate()?;
        Ok(Self {
            config,
            state: TrainerState::Idle,
            trained: None,
        })
    }

    pub fn config(&self) -> &Word2VecConfig {
        &self.config
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// Dictionary of the finished run.
    pub fn dictionary(&self) -> Option<&Dictionary> {
        self.trained.as_ref().map(|t| t.corpus.dictionary())
    }

    /// Trains on `source`, replacing the result of any earlier run.
    ///
    /// A failed or cancelled run leaves the trainer `Idle` with no embeddings.
    #[instrument(
        skip(self, source, cancel),
        fields(model = %self.config.model, optimizer = %self.config.optimizer)
    )]
    pub fn train<S>(&mut self, source: &S, cancel: &CancelToken) -> Result<(), Word2VecError>
    where
        S: TokenSource + ?Sized,
    {
        self.trained = None;
        self.state = TrainerState::Idle;
        match self.run(source, cancel) {
            Ok(trained) => {
                self.trained = Some(trained);
                self.state = TrainerState::Done;
                Ok(())
            }
            Err(err) => {
                self.state = TrainerState::Idle;
                Err(err)
            }
        }
    }

    fn run<S>(&mut self, source: &S, cancel: &CancelToken) -> Result<Trained, Word2VecError>
    where
        S: TokenSource + ?Sized,
    {
        let started = Instant::now();
        let corpus = Corpus::load(source, &self.config, cancel)?;
        if corpus.dictionary().is_empty() {
            return Err(Word2VecError::EmptyCorpus);
        }
        self.state = TrainerState::Initialized;

        let mut rng = seeded_rng(self.config.seed, 0, 0);
        let params = Matrix::random(corpus.dictionary().len(), self.config.dim, &mut rng)?;
        let subsampler = Subsampler::new(corpus.dictionary(), self.config.subsample_threshold);
        let model = context::build(self.config.model, self.config.window);
        let optimizer = optimizer::build(&self.config, corpus.dictionary())?;
        let schedule = decay_schedule(&self.config, &corpus);
        let lr = AtomicU64::new(self.config.initial_lr.to_bits());
        let document = match corpus.mode() {
            CorpusMode::InMemory => corpus.indexed_doc(),
            CorpusMode::Streaming => Vec::new(),
        };

        self.state = TrainerState::Training;
        let mut processed_before = 0;
        for index in 0..self.config.iter {
            cancel.check()?;
            let epoch_started = Instant::now();
            let epoch = Epoch {
                index,
                config: &self.config,
                params: &params,
                optimizer: optimizer.as_ref(),
                model: model.as_ref(),
                subsampler: &subsampler,
                schedule: &schedule,
                lr: &lr,
                processed_before,
                cancel,
            };
            let processed = match corpus.mode() {
                CorpusMode::InMemory => epoch.run_in_memory(&document)?,
                CorpusMode::Streaming => epoch.run_streaming(&corpus, source)?,
            };
            processed_before += processed;
            info!(
                epoch = index + 1,
                processed,
                lr = f64::from_bits(lr.load(Ordering::Relaxed)),
                elapsed_ms = epoch_started.elapsed().as_millis() as u64,
                "epoch finished"
            );
        }

        info!(
            vocabulary = corpus.dictionary().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "training finished"
        );
        Ok(Trained {
            corpus,
            params,
            optimizer,
        })
    }

    /// Vector for one token of the finished run.
    pub fn word_vector(&self, word: &str, aggregation: VectorAggregation) -> Option<Vec<f64>> {
        let trained = self.trained.as_ref()?;
        let id = trained.corpus.dictionary().id(word)?;
        Some(trained.vector(id, aggregation))
    }

    /// Materialises every dictionary entry into an [`EmbeddingMap`].
    pub fn embedding_map(
        &self,
        aggregation: VectorAggregation,
    ) -> Result<EmbeddingMap, Word2VecError> {
        let trained = self.trained.as_ref().ok_or(Word2VecError::NotTrained)?;
        let mut map = EmbeddingMap::new(self.config.dim);
        for (id, word) in trained.corpus.dictionary().words() {
            map.insert(word, trained.vector(id, aggregation))?;
        }
        Ok(map)
    }
}

impl Trained {
    fn vector(&self, id: usize, aggregation: VectorAggregation) -> Vec<f64> {
        let mut vector = self.params.row(id);
        if aggregation == VectorAggregation::Sum {
            if let Some(context) = self.optimizer.context() {
                context.add_row_to(id, 1.0, &mut vector);
            }
        }
        vector
    }
}

impl Epoch<'_> {
    fn run_in_memory(&self, document: &[usize]) -> Result<usize, Word2VecError> {
        let workers = self.config.workers;
        let bounds = index_per_thread(workers, document.len());
        thread::scope(|s| {
            let (tx, rx) = sync_channel(workers * 4);
            let observer = s.spawn(move || self.observe(rx));
            let handles: Vec<_> = bounds
                .windows(2)
                .enumerate()
                .map(|(worker, range)| {
                    let tx = tx.clone();
                    let part = &document[range[0]..range[1]];
                    let mut rng = seeded_rng(self.config.seed, self.index + 1, worker);
                    s.spawn(move || self.train_part(part, &tx, &mut rng))
                })
                .collect();
            drop(tx);

            let outcome = join_workers(handles);
            let processed = observer.join().map_err(|_| Word2VecError::WorkerPanicked)?;
            outcome.map(|()| processed)
        })
    }

    fn run_streaming<S>(&self, corpus: &Corpus, source: &S) -> Result<usize, Word2VecError>
    where
        S: TokenSource + ?Sized,
    {
        let workers = self.config.workers;
        thread::scope(|s| {
            let (batch_tx, batch_rx) = sync_channel::<Vec<usize>>(workers);
            let batches = Arc::new(Mutex::new(batch_rx));
            let (tx, rx) = sync_channel(workers * 4);
            let observer = s.spawn(move || self.observe(rx));
            let producer = s.spawn(move || {
                corpus.batch_words(source, self.config.batch_size, batch_tx, self.cancel)
            });
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let tx = tx.clone();
                    let batches = Arc::clone(&batches);
                    let mut rng = seeded_rng(self.config.seed, self.index + 1, worker);
                    s.spawn(move || -> Result<(), Cancelled> {
                        loop {
                            let next = batches.lock().recv();
                            match next {
                                Ok(batch) => self.train_part(&batch, &tx, &mut rng)?,
                                Err(_) => return Ok(()),
                            }
                        }
                    })
                })
                .collect();
            drop(tx);
            drop(batches);

            let outcome = join_workers(handles);
            let produced = producer.join().map_err(|_| Word2VecError::WorkerPanicked)?;
            let processed = observer.join().map_err(|_| Word2VecError::WorkerPanicked)?;
            produced?;
            outcome.map(|()| processed)
        })
    }

    fn train_part(
        &self,
        part: &[usize],
        progress: &SyncSender<usize>,
        rng: &mut StdRng,
    ) -> Result<(), Cancelled> {
        let mut scratch = Scratch::new(self.config.dim);
        let mut pending = 0;
        for pos in 0..part.len() {
            self.cancel.check()?;
            if self.subsampler.trial(part[pos], rng) {
                let lr = f64::from_bits(self.lr.load(Ordering::Relaxed));
                self.model
                    .train_one(part, pos, lr, self.params, self.optimizer, &mut scratch, rng);
            }
            pending += 1;
            if pending == PROGRESS_CHUNK {
                let _ = progress.send(pending);
                pending = 0;
            }
        }
        if pending > 0 {
            let _ = progress.send(pending);
        }
        Ok(())
    }

    /// Drains progress counts, decaying the shared learning rate on a fixed cadence.
    fn observe(&self, rx: Receiver<usize>) -> usize {
        let started = Instant::now();
        let mut processed = 0;
        let mut next_update = self.config.update_lr_batch;
        let mut next_log = self.config.log_batch;
        for count in rx {
            processed += count;
            if processed >= next_update {
                let lr = self.schedule.learning_rate(self.processed_before + processed);
                self.lr.store(lr.to_bits(), Ordering::Relaxed);
                while next_update <= processed {
                    next_update += self.config.update_lr_batch;
                }
            }
            if processed >= next_log {
                let secs = started.elapsed().as_secs_f64().max(f64::EPSILON);
                debug!(
                    epoch = self.index + 1,
                    processed,
                    words_per_sec = (processed as f64 / secs) as u64,
                    lr = f64::from_bits(self.lr.load(Ordering::Relaxed)),
                    "training progress"
                );
                while next_log <= processed {
                    next_log += self.config.log_batch;
                }
            }
        }
        processed
    }
}

fn join_workers(
    handles: Vec<thread::ScopedJoinHandle<'_, Result<(), Cancelled>>>,
) -> Result<(), Word2VecError> {
    let mut outcome = Ok(());
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(cancelled)) => outcome = Err(cancelled.into()),
            Err(_) => outcome = Err(Word2VecError::WorkerPanicked),
        }
    }
    outcome
}

/// Contiguous `[start, end)` boundaries splitting `len` items over `workers`.
pub fn index_per_thread(workers: usize, len: usize) -> Vec<usize> {
    let workers = workers.max(1);
    (0..=workers).map(|w| w * len / workers).collect()
}

fn seeded_rng(seed: Option<u64>, epoch: usize, worker: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(
            seed ^ ((epoch as u64) << 32) ^ (worker as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
        ),
        None => StdRng::from_os_rng(),
    }
}

/// Decays over the tokens the workers actually visit, every epoch included.
fn decay_schedule(config: &Word2VecConfig, corpus: &Corpus) -> LinearDecay {
    LinearDecay::new(
        config.initial_lr,
        config.min_lr,
        corpus.trainable_len() * config.iter,
    )
}
