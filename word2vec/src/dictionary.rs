use std::collections::HashMap;

/// Bidirectional token/id mapping with occurrence counts.
///
/// Ids are dense and assigned in order of first appearance.
#[derive(Clone, Debug, Default)]
pub struct Dictionary {
    ids: HashMap<String, usize>,
    words: Vec<String>,
    counts: Vec<u64>,
    total: u64,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `word`, returning its id and whether it was new.
    pub fn add(&mut self, word: &str) -> (usize, bool) {
        self.total += 1;
        if let Some(&id) = self.ids.get(word) {
            self.counts[id] += 1;
            return (id, false);
        }
        let id = self.words.len();
        self.ids.insert(word.to_string(), id);
        self.words.push(word.to_string());
        self.counts.push(1);
        (id, true)
    }

    pub fn id(&self, word: &str) -> Option<usize> {
        self.ids.get(word).copied()
    }

    pub fn word(&self, id: usize) -> Option<&str> {
        self.words.get(id).map(String::as_str)
    }

    /// Occurrences of `id`, `0` for ids outside the dictionary.
    pub fn count(&self, id: usize) -> u64 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Total number of recorded occurrences.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> impl Iterator<Item = (usize, &str)> {
        self.words.iter().enumerate().map(|(id, w)| (id, w.as_str()))
    }
}
