//! Brute-force cosine nearest-neighbour queries over an [`EmbeddingMap`].

use std::cmp::Ordering;
use std::fmt;

use crate::EmbeddingMap;

/// Word returned by a similarity query.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    pub word: String,
    pub similarity: f64,
}

impl fmt::Display for Neighbor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.4})", self.word, self.similarity)
    }
}

pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl EmbeddingMap {
    /// Returns the `k` words most similar to `query`, best first.
    pub fn search(&self, query: &[f64], k: usize, exclude: Option<&str>) -> Vec<Neighbor> {
        let mut hits: Vec<Neighbor> = self
            .iter()
            .filter(|(word, _)| Some(*word) != exclude)
            .map(|(word, vector)| Neighbor {
                word: word.to_string(),
                similarity: cosine(query, vector),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.word.cmp(&b.word))
        });
        hits.truncate(k);
        hits
    }

    /// Nearest neighbours of a known word, excluding the word itself.
    pub fn neighbors(&self, word: &str, k: usize) -> Option<Vec<Neighbor>> {
        let query = self.get(word)?;
        Some(self.search(query, k, Some(word)))
    }
}
