//! Softmax approximations applied to one `(input, target)` training pair.

mod hierarchical_softmax;
mod huffman;
mod negative_sampling;

pub use hierarchical_softmax::HierarchicalSoftmax;
pub use huffman::{HuffmanPath, HuffmanTree};
pub use negative_sampling::{NegativeSampling, UnigramTable};

use rand::rngs::StdRng;

use crate::Word2VecError;
use crate::config::{OptimizerType, Word2VecConfig};
use crate::dictionary::Dictionary;
use crate::matrix::Matrix;

const MAX_EXP: f64 = 6.0;

pub trait Optimizer: Send + Sync {
    /// Updates the optimizer's own parameters in place and adds the gradient
    /// for `input` into `grad`.
    fn optimize(&self, target: usize, input: &[f64], lr: f64, grad: &mut [f64], rng: &mut StdRng);

    /// Context matrix that may be summed into the public vectors.
    fn context(&self) -> Option<&Matrix> {
        None
    }
}

pub fn build(
    config: &Word2VecConfig,
    dictionary: &Dictionary,
) -> Result<Box<dyn Optimizer>, Word2VecError> {
    Ok(match config.optimizer {
        OptimizerType::NegativeSampling => Box::new(NegativeSampling::new(
            dictionary,
            config.dim,
            config.negative_samples,
            config.unigram_table_size,
        )),
        OptimizerType::HierarchicalSoftmax => {
            Box::new(HierarchicalSoftmax::new(dictionary, config.dim))
        }
    })
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    if x > MAX_EXP {
        1.0
    } else if x < -MAX_EXP {
        0.0
    } else {
        1.0 / (1.0 + (-x).exp())
    }
}
