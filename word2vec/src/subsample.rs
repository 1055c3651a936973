use rand::Rng;

use crate::dictionary::Dictionary;

/// Frequency-based keep/drop decision per token id.
#[derive(Clone, Debug)]
pub struct Subsampler {
    keep: Vec<f64>,
}

impl Subsampler {
    /// Precomputes `p(t) = (sqrt(f/ρ) + 1) · ρ/f` clamped to `[0, 1]` for every id.
    /// A threshold of `0` keeps everything.
    pub fn new(dictionary: &Dictionary, threshold: f64) -> Self {
        let total = dictionary.total() as f64;
        let keep = dictionary
            .counts()
            .iter()
            .map(|&count| {
                if threshold <= 0.0 || count == 0 || total == 0.0 {
                    return 1.0;
                }
                let freq = count as f64 / total;
                (((freq / threshold).sqrt() + 1.0) * threshold / freq).clamp(0.0, 1.0)
            })
            .collect();
        Self { keep }
    }

    pub fn keep_probability(&self, id: usize) -> f64 {
        self.keep.get(id).copied().unwrap_or(1.0)
    }

    pub fn trial<R: Rng + ?Sized>(&self, id: usize, rng: &mut R) -> bool {
        let p = self.keep_probability(id);
        p >= 1.0 || rng.random::<f64>() < p
    }
}
