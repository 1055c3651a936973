use datasets::{CancelToken, Cancelled};
use serde::{Deserialize, Serialize};

/// Which side of the pipeline a collaborator call is made from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Train,
    Predict,
}

/// Per-call context handed to every collaborator.
#[derive(Clone, Debug)]
pub struct RunContext {
    stage: Stage,
    cancel: CancelToken,
}

impl RunContext {
    pub fn new(stage: Stage, cancel: CancelToken) -> Self {
        Self { stage, cancel }
    }

    pub fn train(cancel: CancelToken) -> Self {
        Self::new(Stage::Train, cancel)
    }

    pub fn predict(cancel: CancelToken) -> Self {
        Self::new(Stage::Predict, cancel)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        self.cancel.check()
    }
}
