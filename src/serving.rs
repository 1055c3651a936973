use datasets::CancelToken;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::assembler::SampleKey;
use crate::context::RunContext;
use crate::error::{AssemblyError, PipelineError};
use crate::pipeline::TrainedModel;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemScore {
    pub item_id: u64,
    pub score: f64,
}

impl TrainedModel {
    /// Scores `(user, item)` pairs with a single predictor call.
    ///
    /// A pair that fails to assemble, or assembles to a different layout than
    /// the one trained on, is scored from a zero row so the batch keeps its shape.
    #[instrument(skip(self, cancel, pairs), fields(batch = pairs.len()))]
    pub fn batch_predict(
        &self,
        cancel: &CancelToken,
        pairs: &[(u64, u64)],
    ) -> Result<Array1<f64>, PipelineError> {
        let ctx = RunContext::predict(cancel.clone());
        if let Some(hook) = &self.assembler.provider().pre_ranker {
            hook.pre_rank(&ctx).map_err(PipelineError::PreRank)?;
        }
        if pairs.is_empty() {
            return Ok(Array1::zeros(0));
        }

        let features = self.serving_matrix(&ctx, pairs)?;
        let scores = self
            .predictor
            .predict(&features)
            .map_err(PipelineError::Predict)?;
        if scores.len() != pairs.len() {
            return Err(PipelineError::PredictionShape {
                expected: pairs.len(),
                found: scores.len(),
            });
        }
        Ok(scores)
    }

    /// Scores `items` for one user, in request order.
    pub fn rank(
        &self,
        cancel: &CancelToken,
        user: u64,
        items: &[u64],
    ) -> Result<Vec<ItemScore>, PipelineError> {
        let pairs: Vec<(u64, u64)> = items.iter().map(|&item| (user, item)).collect();
        let scores = self.batch_predict(cancel, &pairs)?;
        Ok(items
            .iter()
            .zip(scores.iter())
            .map(|(&item_id, &score)| ItemScore { item_id, score })
            .collect())
    }

    fn serving_matrix(
        &self,
        ctx: &RunContext,
        pairs: &[(u64, u64)],
    ) -> Result<Array2<f64>, PipelineError> {
        let mut features = Array2::zeros((pairs.len(), self.info.width()));
        let mut substituted = 0usize;
        for (mut row, &(user, item)) in features.rows_mut().into_iter().zip(pairs) {
            match self.assembler.assemble(ctx, SampleKey::latest(user, item)) {
                Ok(vector) => match self.info.check(vector.widths) {
                    Ok(()) => row.assign(&ArrayView1::from(vector.values.as_slice())),
                    Err(err) => {
                        warn!(user, item, error = %err, "zero vector substituted");
                        substituted += 1;
                    }
                },
                Err(AssemblyError::Cancelled(cancelled)) => return Err(cancelled.into()),
                Err(err) => {
                    warn!(user, item, error = %err, "zero vector substituted");
                    substituted += 1;
                }
            }
        }
        if substituted > 0 {
            debug!(substituted, "batch assembled with zero rows");
        }
        Ok(features)
    }
}
