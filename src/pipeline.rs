//! Training side of the pipeline: item embeddings, parallel sample assembly
//! into one matrix, then a fit through the injected [`Fitter`].

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;
use std::time::Instant;

use datasets::{CancelToken, Example, Examples, Sample};
use embedding_store::EmbeddingMap;
use ndarray::{Array1, Array2};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use word2vec::Word2VecConfig;

use crate::assembler::{
    AssembledVector, AssemblerConfig, FeatureCaches, SampleAssembler, SampleKey,
};
use crate::context::RunContext;
use crate::embedding::{item_embedding_config, train_item_embedding};
use crate::error::{AssemblyError, PipelineError};
use crate::layout::{LayoutError, LayoutGuard, SampleInfo};
use crate::provider::{FeatureProvider, Fitter, Predictor, SampleGenerator};

/// What to do with a training sample whose widths differ from the established layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Log and drop the sample.
    #[default]
    Skip,
    /// Fail the whole run.
    Abort,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrent assembler workers.
    pub workers: usize,
    /// Capacity of the sample and result queues.
    pub queue_depth: usize,
    pub mismatch: MismatchPolicy,
    /// Hand the training caches to the trained model instead of clearing them.
    pub reuse_caches: bool,
    pub log_every: usize,
    pub assembler: AssemblerConfig,
    pub embedding: Word2VecConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            queue_depth: 256,
            mismatch: MismatchPolicy::Skip,
            reuse_caches: false,
            log_every: 100,
            assembler: AssemblerConfig::default(),
            embedding: item_embedding_config(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.workers == 0 || self.queue_depth == 0 || self.log_every == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "workers, queue_depth and log_every must be greater than zero".to_string(),
            ));
        }
        if self.embedding.dim != self.assembler.embedding_dim {
            return Err(PipelineError::InvalidConfiguration(format!(
                "embedding dim {} does not match assembler embedding_dim {}",
                self.embedding.dim, self.assembler.embedding_dim
            )));
        }
        Ok(())
    }
}

/// Assembled training rows with one label per row.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingSet {
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
    pub info: SampleInfo,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn width(&self) -> usize {
        self.features.ncols()
    }

    pub fn examples(&self) -> Examples {
        self.features
            .rows()
            .into_iter()
            .zip(self.labels.iter())
            .map(|(row, &label)| Example::new(row.to_vec(), vec![label]))
            .collect()
    }
}

/// A fitted predictor together with everything needed to assemble serving vectors.
pub struct TrainedModel {
    pub(crate) predictor: Box<dyn Predictor>,
    pub(crate) info: SampleInfo,
    pub(crate) assembler: SampleAssembler,
}

impl TrainedModel {
    /// Wraps parts restored outside a training run, e.g. a predictor and
    /// `SampleInfo` loaded from disk. `info` must be a contiguous layout.
    pub fn new(
        predictor: Box<dyn Predictor>,
        info: SampleInfo,
        assembler: SampleAssembler,
    ) -> Result<Self, LayoutError> {
        info.validate()?;
        Ok(Self {
            predictor,
            info,
            assembler,
        })
    }

    pub fn info(&self) -> SampleInfo {
        self.info
    }

    pub fn assembler(&self) -> &SampleAssembler {
        &self.assembler
    }

    pub fn embeddings(&self) -> Option<&Arc<EmbeddingMap>> {
        self.assembler.embeddings()
    }

    pub fn predictor(&self) -> &dyn Predictor {
        self.predictor.as_ref()
    }

    pub fn save_info(&self, path: &Path) -> Result<(), LayoutError> {
        self.info.save(path)
    }
}

/// Runs the full training flow for `provider` and fits the result.
#[instrument(skip_all, fields(workers = config.workers))]
pub fn train(
    provider: FeatureProvider,
    fitter: &dyn Fitter,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<TrainedModel, PipelineError> {
    config.validate()?;
    let generator = provider
        .samples
        .clone()
        .ok_or(PipelineError::MissingSampleGenerator)?;
    let ctx = RunContext::train(cancel.clone());

    if let Some(hook) = &provider.pre_trainer {
        hook.pre_train(&ctx).map_err(PipelineError::PreTrain)?;
    }

    let embeddings = match &provider.item_embedding {
        Some(source) => Some(Arc::new(train_item_embedding(
            &ctx,
            source.as_ref(),
            &config.embedding,
        )?)),
        None => None,
    };

    let caches = Arc::new(FeatureCaches::new(&config.assembler));
    let assembler = SampleAssembler::new(
        provider,
        embeddings,
        Arc::clone(&caches),
        config.assembler.clone(),
    )?;
    let collected = collect_training_set(&ctx, &assembler, generator.as_ref(), config);
    let assembler = if config.reuse_caches {
        assembler
    } else {
        caches.clear();
        assembler.with_caches(Arc::new(FeatureCaches::new(&config.assembler)))
    };
    let set = collected?;

    info!(samples = set.len(), width = set.width(), "start fitting");
    let predictor = fitter.fit(&set).map_err(PipelineError::Fit)?;
    Ok(TrainedModel {
        predictor,
        info: set.info,
        assembler,
    })
}

type Outcome = (Sample, Result<AssembledVector, AssemblyError>);

/// Streams samples through `config.workers` assemblers into one matrix.
///
/// The first result fixes the layout; a failure to assemble it fails the run.
/// Later failures are dropped, and later width mismatches follow
/// `config.mismatch`.
pub fn collect_training_set(
    ctx: &RunContext,
    assembler: &SampleAssembler,
    generator: &dyn SampleGenerator,
    config: &PipelineConfig,
) -> Result<TrainingSet, PipelineError> {
    let samples = generator.samples(ctx).map_err(PipelineError::Samples)?;
    let started = Instant::now();

    thread::scope(|s| {
        let (sample_tx, sample_rx) = sync_channel::<Sample>(config.queue_depth);
        let (result_tx, result_rx) = sync_channel::<Outcome>(config.queue_depth);
        let sample_rx = Arc::new(Mutex::new(sample_rx));

        let producer = s.spawn(move || produce(ctx, samples, sample_tx));
        let workers: Vec<_> = (0..config.workers)
            .map(|_| {
                let rx = Arc::clone(&sample_rx);
                let tx = result_tx.clone();
                s.spawn(move || assemble_worker(ctx, assembler, &rx, &tx))
            })
            .collect();
        drop(sample_rx);
        drop(result_tx);

        let consumed = consume(result_rx, config);

        for worker in workers {
            worker.join().map_err(|_| PipelineError::WorkerPanicked)?;
        }
        let produced = producer.join().map_err(|_| PipelineError::WorkerPanicked)?;
        ctx.check()?;
        let set = consumed?;
        let sent = produced?;

        info!(
            samples = set.len(),
            skipped = sent.saturating_sub(set.len()),
            width = set.width(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "training set assembled"
        );
        Ok(set)
    })
}

fn produce<I>(ctx: &RunContext, samples: I, tx: SyncSender<Sample>) -> Result<usize, PipelineError>
where
    I: Iterator<Item = anyhow::Result<Sample>>,
{
    let mut sent = 0;
    for sample in samples {
        ctx.check()?;
        let sample = sample.map_err(PipelineError::Samples)?;
        if tx.send(sample).is_err() {
            break;
        }
        sent += 1;
    }
    Ok(sent)
}

fn assemble_worker(
    ctx: &RunContext,
    assembler: &SampleAssembler,
    rx: &Mutex<Receiver<Sample>>,
    tx: &SyncSender<Outcome>,
) {
    loop {
        let next = rx.lock().recv();
        let Ok(sample) = next else {
            return;
        };
        if ctx.is_cancelled() {
            return;
        }
        let outcome = assembler.assemble(ctx, SampleKey::from(&sample));
        if tx.send((sample, outcome)).is_err() {
            return;
        }
    }
}

fn consume(
    results: Receiver<Outcome>,
    config: &PipelineConfig,
) -> Result<TrainingSet, PipelineError> {
    let mut guard = LayoutGuard::new();
    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut received = 0usize;

    for (sample, outcome) in results {
        received += 1;
        let vector = match outcome {
            Ok(vector) => vector,
            Err(AssemblyError::Cancelled(cancelled)) => return Err(cancelled.into()),
            Err(err) if received == 1 => return Err(PipelineError::FirstSample(err)),
            Err(err) => {
                warn!(
                    user = sample.user_id,
                    item = sample.item_id,
                    error = %err,
                    "sample skipped"
                );
                continue;
            }
        };
        if let Err(err) = guard.observe(vector.widths) {
            match config.mismatch {
                MismatchPolicy::Skip => {
                    warn!(
                        user = sample.user_id,
                        item = sample.item_id,
                        error = %err,
                        "sample skipped"
                    );
                    continue;
                }
                MismatchPolicy::Abort => return Err(err.into()),
            }
        }
        features.extend_from_slice(&vector.values);
        labels.push(sample.label);
        if labels.len() % config.log_every == 0 {
            info!(samples = labels.len(), received, "assembling samples");
        }
    }

    let info = guard.info().ok_or(PipelineError::NoSamples)?;
    let rows = labels.len();
    Ok(TrainingSet {
        features: Array2::from_shape_vec((rows, info.width()), features)?,
        labels: Array1::from_vec(labels),
        info,
    })
}
