use rand::Rng;
use rand::rngs::StdRng;

use super::{Optimizer, sigmoid};
use crate::dictionary::Dictionary;
use crate::matrix::Matrix;

const POWER: f64 = 0.75;
const MAX_RESAMPLE: usize = 64;

/// Ids laid out proportionally to `count^0.75` for O(1) negative draws.
#[derive(Clone, Debug)]
pub struct UnigramTable {
    table: Vec<usize>,
    vocabulary: usize,
}

impl UnigramTable {
    pub fn new(counts: &[u64], size: usize) -> Self {
        let vocabulary = counts.len();
        if vocabulary == 0 || size == 0 {
            return Self {
                table: Vec::new(),
                vocabulary,
            };
        }
        let norm: f64 = counts.iter().map(|&c| (c as f64).powf(POWER)).sum();
        let mut table = Vec::with_capacity(size);
        let mut id = 0;
        let mut cumulative = (counts[0] as f64).powf(POWER) / norm;
        for slot in 0..size {
            table.push(id);
            if slot as f64 / size as f64 > cumulative && id + 1 < vocabulary {
                id += 1;
                cumulative += (counts[id] as f64).powf(POWER) / norm;
            }
        }
        Self { table, vocabulary }
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.table.is_empty() {
            return None;
        }
        Some(self.table[rng.random_range(0..self.table.len())])
    }

    /// Draws an id different from `positive`, or `None` when the vocabulary has one id.
    ///
    /// Collisions are resampled a bounded number of times before falling back to a
    /// uniform pick among the other ids.
    pub fn draw_excluding<R: Rng + ?Sized>(&self, positive: usize, rng: &mut R) -> Option<usize> {
        if self.vocabulary < 2 {
            return None;
        }
        for _ in 0..MAX_RESAMPLE {
            match self.draw(rng) {
                Some(id) if id != positive => return Some(id),
                Some(_) => continue,
                None => return None,
            }
        }
        let offset = rng.random_range(1..self.vocabulary);
        Some((positive + offset) % self.vocabulary)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

pub struct NegativeSampling {
    context: Matrix,
    table: UnigramTable,
    negatives: usize,
}

impl NegativeSampling {
    pub fn new(dictionary: &Dictionary, dim: usize, negatives: usize, table_size: usize) -> Self {
        Self {
            context: Matrix::zeros(dictionary.len(), dim),
            table: UnigramTable::new(dictionary.counts(), table_size),
            negatives,
        }
    }
}

impl Optimizer for NegativeSampling {
    fn optimize(&self, target: usize, input: &[f64], lr: f64, grad: &mut [f64], rng: &mut StdRng) {
        for d in 0..=self.negatives {
            let (sample, label) = if d == 0 {
                (target, 1.0)
            } else {
                match self.table.draw_excluding(target, rng) {
                    Some(id) => (id, 0.0),
                    None => break,
                }
            };
            let g = (label - sigmoid(self.context.dot(sample, input))) * lr;
            self.context.add_row_to(sample, g, grad);
            self.context.axpy_row(sample, g, input);
        }
    }

    fn context(&self) -> Option<&Matrix> {
        Some(&self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn table_follows_smoothed_frequencies() {
        let table = UnigramTable::new(&[100, 1], 10_000);
        let mut rng = StdRng::seed_from_u64(3);
        let frequent = (0..10_000)
            .filter(|_| table.draw(&mut rng) == Some(0))
            .count();
        assert!(frequent > 9_000, "frequent drawn {frequent} times");
        assert_eq!(table.len(), 10_000);
    }

    #[test]
    fn negatives_never_equal_positive() {
        let table = UnigramTable::new(&[1_000_000, 1], 1_000);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            assert_eq!(table.draw_excluding(0, &mut rng), Some(1));
        }
    }

    #[test]
    fn single_word_vocabulary_has_no_negatives() {
        let table = UnigramTable::new(&[5], 100);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(table.draw_excluding(0, &mut rng), None);
    }

    #[test]
    fn positive_update_moves_context_toward_input() {
        let mut dic = Dictionary::new();
        dic.add("a");
        let ns = NegativeSampling::new(&dic, 2, 3, 10);
        let mut grad = vec![0.0; 2];
        let mut rng = StdRng::seed_from_u64(0);

        ns.optimize(0, &[1.0, -1.0], 0.5, &mut grad, &mut rng);

        // sigmoid(0) = 0.5 so g = 0.25; grad reads the zero row before the update.
        assert_eq!(grad, vec![0.0, 0.0]);
        assert_eq!(ns.context.row(0), vec![0.25, -0.25]);
    }
}
