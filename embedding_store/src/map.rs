use std::collections::HashMap;
use std::io::{Read, Write};

use crate::EmbeddingError;
use crate::codec::{self, EmbeddingFormat};

/// Read-only lookup from token to embedding vector.
///
/// Every vector shares the same dimensionality; unknown tokens encode to zeros.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmbeddingMap {
    table: HashMap<String, Vec<f64>>,
    dimension: usize,
}

impl EmbeddingMap {
    /// Creates an empty map for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            table: HashMap::new(),
            dimension,
        }
    }

    /// Builds a map from an existing table, ensuring all vectors share one dimensionality.
    pub fn from_table(table: HashMap<String, Vec<f64>>) -> Result<Self, EmbeddingError> {
        let dimension = table.values().next().map(|v| v.len()).unwrap_or(0);
        for (word, vector) in &table {
            if vector.len() != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    word: word.clone(),
                    expected: dimension,
                    found: vector.len(),
                });
            }
        }
        Ok(Self { table, dimension })
    }

    pub fn insert(
        &mut self,
        word: impl Into<String>,
        vector: Vec<f64>,
    ) -> Result<(), EmbeddingError> {
        let word = word.into();
        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                word,
                expected: self.dimension,
                found: vector.len(),
            });
        }
        self.table.insert(word, vector);
        Ok(())
    }

    pub fn get(&self, word: &str) -> Option<&[f64]> {
        self.table.get(word).map(Vec::as_slice)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.table.contains_key(word)
    }

    /// Returns the embedding for `word` or zeros if it is unseen.
    pub fn encode(&self, word: &str) -> Vec<f64> {
        self.table
            .get(word)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.dimension])
    }

    /// Copies the embedding for `word` into `out`, reporting whether it was found.
    ///
    /// `out` is left untouched for unknown words.
    pub fn copy_into(&self, word: &str, out: &mut [f64]) -> bool {
        match self.table.get(word) {
            Some(vector) => {
                let n = out.len().min(vector.len());
                out[..n].copy_from_slice(&vector[..n]);
                true
            }
            None => false,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.table
            .iter()
            .map(|(word, vector)| (word.as_str(), vector.as_slice()))
    }

    /// Words sorted lexicographically, used to make written files reproducible.
    pub fn sorted_words(&self) -> Vec<&str> {
        let mut words: Vec<&str> = self.table.keys().map(String::as_str).collect();
        words.sort_unstable();
        words
    }

    /// Writes the map using the requested format.
    pub fn save<W: Write>(&self, writer: W, format: EmbeddingFormat) -> Result<(), EmbeddingError> {
        codec::save(self, writer, format)
    }

    /// Reads a map previously written with [`EmbeddingMap::save`].
    pub fn load<R: Read>(reader: R, format: EmbeddingFormat) -> Result<Self, EmbeddingError> {
        codec::load(reader, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_token_returns_zeros() {
        let mut map = EmbeddingMap::new(2);
        map.insert("hello", vec![1.0, 0.5]).unwrap();

        assert_eq!(map.dimension(), 2);
        assert_eq!(map.encode("hello"), vec![1.0, 0.5]);
        assert_eq!(map.encode("missing"), vec![0.0, 0.0]);
    }

    #[test]
    fn copy_into_leaves_buffer_for_unknown_words() {
        let mut map = EmbeddingMap::new(2);
        map.insert("a", vec![3.0, 4.0]).unwrap();
        let mut out = [9.0, 9.0];
        assert!(!map.copy_into("b", &mut out));
        assert_eq!(out, [9.0, 9.0]);
        assert!(map.copy_into("a", &mut out));
        assert_eq!(out, [3.0, 4.0]);
    }

    #[test]
    fn inconsistent_dimensions_are_rejected() {
        let mut table = HashMap::new();
        table.insert("a".to_string(), vec![1.0]);
        table.insert("b".to_string(), vec![0.0, 1.0]);
        let err = EmbeddingMap::from_table(table).unwrap_err();
        assert!(matches!(err, EmbeddingError::DimensionMismatch { .. }));

        let mut map = EmbeddingMap::new(3);
        assert!(map.insert("c", vec![1.0]).is_err());
        assert!(map.is_empty());
    }
}
