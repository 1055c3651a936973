/// Linear learning-rate decay over the whole training run.
///
/// The rate falls from `initial_lr` toward zero as processed tokens approach
/// `total_tokens` and never drops below `min_lr`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearDecay {
    pub initial_lr: f64,
    pub min_lr: f64,
    pub total_tokens: usize,
}

impl LinearDecay {
    pub fn new(initial_lr: f64, min_lr: f64, total_tokens: usize) -> Self {
        Self {
            initial_lr,
            min_lr,
            total_tokens,
        }
    }

    pub fn learning_rate(&self, processed: usize) -> f64 {
        if self.total_tokens == 0 {
            return self.min_lr;
        }
        let progress = (processed as f64 / self.total_tokens as f64).min(1.0);
        (self.initial_lr * (1.0 - progress)).max(self.min_lr)
    }
}
