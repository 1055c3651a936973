#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use datasets::Sample;
use edgerec::{
    Fitter, ItemEmbedding, ItemFeaturer, Predictor, RunContext, SampleGenerator, Tensor,
    TrainingSet, UserFeaturer,
};
use ndarray::{Array1, Array2, Axis};
use parking_lot::Mutex;

/// `[user, 1.0]` for every user, or a per-user width when one is configured.
#[derive(Default)]
pub struct Users {
    pub widths: Vec<(u64, usize)>,
    pub calls: AtomicUsize,
}

impl Users {
    pub fn with_widths(widths: &[(u64, usize)]) -> Self {
        Self {
            widths: widths.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl UserFeaturer for Users {
    fn user_feature(&self, _ctx: &RunContext, user: u64) -> Result<Tensor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.widths.iter().find(|(id, _)| *id == user) {
            Some(&(_, width)) => Ok(vec![user as f64; width]),
            None => Ok(vec![user as f64, 1.0]),
        }
    }
}

/// `[item]`; item 404 does not exist.
pub struct Items;

impl ItemFeaturer for Items {
    fn item_feature(&self, _ctx: &RunContext, item: u64) -> Result<Tensor> {
        if item == 404 {
            return Err(anyhow!("item {item} not found"));
        }
        Ok(vec![item as f64])
    }
}

pub struct InMemorySamples(pub Vec<Sample>);

impl SampleGenerator for InMemorySamples {
    fn samples(
        &self,
        _ctx: &RunContext,
    ) -> Result<Box<dyn Iterator<Item = Result<Sample>> + Send + '_>> {
        Ok(Box::new(self.0.iter().copied().map(Ok)))
    }
}

pub struct ItemSessions(pub Vec<&'static str>);

impl ItemEmbedding for ItemSessions {
    fn item_sequence(
        &self,
        _ctx: &RunContext,
    ) -> Result<Box<dyn Iterator<Item = String> + Send + '_>> {
        Ok(Box::new(
            self.0
                .iter()
                .flat_map(|session| session.split_whitespace().map(str::to_string)),
        ))
    }
}

/// Scores each row with its sum and counts predictor invocations.
pub struct RowSum {
    pub calls: Arc<AtomicUsize>,
}

impl Predictor for RowSum {
    fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(features.sum_axis(Axis(1)))
    }
}

/// Keeps a copy of the training set it was fitted on.
#[derive(Default)]
pub struct RecordingFitter {
    pub seen: Mutex<Option<TrainingSet>>,
    pub calls: Arc<AtomicUsize>,
}

impl Fitter for RecordingFitter {
    fn fit(&self, train: &TrainingSet) -> Result<Box<dyn Predictor>> {
        *self.seen.lock() = Some(train.clone());
        Ok(Box::new(RowSum {
            calls: Arc::clone(&self.calls),
        }))
    }
}

impl RecordingFitter {
    pub fn training_set(&self) -> TrainingSet {
        self.seen.lock().clone().expect("fitter was called")
    }

    pub fn predictions(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
