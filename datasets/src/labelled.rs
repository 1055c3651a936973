//! Labelled feature rows and the shuffling/splitting helpers fitters use to
//! carve training and validation sets.

use rand::Rng;
use rand::seq::SliceRandom;

/// Input/response pair produced by the assembler.
#[derive(Clone, Debug, PartialEq)]
pub struct Example {
    pub input: Vec<f64>,
    pub response: Vec<f64>,
}

impl Example {
    pub fn new(input: Vec<f64>, response: Vec<f64>) -> Self {
        Self { input, response }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Examples(pub Vec<Example>);

impl Examples {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Example> {
        self.0.iter()
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.0.shuffle(rng);
    }

    /// Assigns every example to the first set with probability `p`, otherwise to the second.
    pub fn split<R: Rng + ?Sized>(&self, p: f64, rng: &mut R) -> (Examples, Examples) {
        let mut first = Vec::new();
        let mut second = Vec::new();
        for example in &self.0 {
            if p > rng.random::<f64>() {
                first.push(example.clone());
            } else {
                second.push(example.clone());
            }
        }
        (Examples(first), Examples(second))
    }

    /// Chunks the examples into consecutive parts of at most `size` elements.
    pub fn split_size(&self, size: usize) -> Vec<Examples> {
        if size == 0 {
            return vec![self.clone()];
        }
        self.0
            .chunks(size)
            .map(|chunk| Examples(chunk.to_vec()))
            .collect()
    }

    /// Deals the examples round-robin into `n` parts.
    pub fn split_n(&self, n: usize) -> Vec<Examples> {
        let n = n.max(1);
        let mut parts = vec![Examples::default(); n];
        for (idx, example) in self.0.iter().enumerate() {
            parts[idx % n].0.push(example.clone());
        }
        parts
    }
}

impl FromIterator<Example> for Examples {
    fn from_iter<I: IntoIterator<Item = Example>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
