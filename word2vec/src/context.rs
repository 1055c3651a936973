use rand::rngs::StdRng;

use crate::config::ModelType;
use crate::matrix::Matrix;
use crate::optimizer::Optimizer;

/// Per-worker buffers reused across positions.
pub struct Scratch {
    input: Vec<f64>,
    grad: Vec<f64>,
}

impl Scratch {
    pub fn new(dim: usize) -> Self {
        Self {
            input: vec![0.0; dim],
            grad: vec![0.0; dim],
        }
    }
}

/// Turns one position of a document into optimizer updates on the input matrix.
pub trait ContextModel: Send + Sync {
    fn train_one(
        &self,
        doc: &[usize],
        pos: usize,
        lr: f64,
        params: &Matrix,
        optimizer: &dyn Optimizer,
        scratch: &mut Scratch,
        rng: &mut StdRng,
    );
}

pub fn build(model: ModelType, window: usize) -> Box<dyn ContextModel> {
    match model {
        ModelType::SkipGram => Box::new(SkipGram { window }),
        ModelType::Cbow => Box::new(Cbow { window }),
    }
}

/// Positions within `window` of `pos`, clipped to the document, excluding `pos`.
pub fn window_positions(len: usize, pos: usize, window: usize) -> impl Iterator<Item = usize> {
    let start = pos.saturating_sub(window);
    let end = (pos + window).min(len.saturating_sub(1));
    (start..=end).filter(move |&j| j != pos)
}

#[derive(Clone, Copy, Debug)]
pub struct SkipGram {
    pub window: usize,
}

impl SkipGram {
    /// `(center, context)` id pairs emitted for `pos`.
    pub fn pairs(&self, doc: &[usize], pos: usize) -> Vec<(usize, usize)> {
        window_positions(doc.len(), pos, self.window)
            .map(|j| (doc[pos], doc[j]))
            .collect()
    }
}

impl ContextModel for SkipGram {
    fn train_one(
        &self,
        doc: &[usize],
        pos: usize,
        lr: f64,
        params: &Matrix,
        optimizer: &dyn Optimizer,
        scratch: &mut Scratch,
        rng: &mut StdRng,
    ) {
        for (center, context) in self.pairs(doc, pos) {
            params.read_row_into(center, &mut scratch.input);
            scratch.grad.fill(0.0);
            optimizer.optimize(context, &scratch.input, lr, &mut scratch.grad, rng);
            params.axpy_row(center, 1.0, &scratch.grad);
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Cbow {
    pub window: usize,
}

impl ContextModel for Cbow {
    fn train_one(
        &self,
        doc: &[usize],
        pos: usize,
        lr: f64,
        params: &Matrix,
        optimizer: &dyn Optimizer,
        scratch: &mut Scratch,
        rng: &mut StdRng,
    ) {
        let context: Vec<usize> = window_positions(doc.len(), pos, self.window)
            .map(|j| doc[j])
            .collect();
        if context.is_empty() {
            return;
        }
        scratch.input.fill(0.0);
        for &id in &context {
            params.add_row_to(id, 1.0, &mut scratch.input);
        }
        let n = context.len() as f64;
        scratch.input.iter_mut().for_each(|v| *v /= n);

        scratch.grad.fill(0.0);
        optimizer.optimize(doc[pos], &scratch.input, lr, &mut scratch.grad, rng);
        for &id in &context {
            params.axpy_row(id, 1.0, &scratch.grad);
        }
    }
}
