//! Token sources that the corpus reads from.
//!
//! A source hands out a fresh token iterator on every [`TokenSource::open`];
//! streaming training opens it once per epoch, so sources that cannot replay
//! report [`Word2VecError::SourceExhausted`] instead.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::Word2VecError;

pub type Tokens<'a> = Box<dyn Iterator<Item = io::Result<String>> + Send + 'a>;

pub trait TokenSource: Sync {
    fn open(&self) -> Result<Tokens<'_>, Word2VecError>;
}

impl TokenSource for [String] {
    fn open(&self) -> Result<Tokens<'_>, Word2VecError> {
        Ok(Box::new(self.iter().cloned().map(Ok)))
    }
}

impl TokenSource for Vec<String> {
    fn open(&self) -> Result<Tokens<'_>, Word2VecError> {
        self.as_slice().open()
    }
}

impl TokenSource for [&str] {
    fn open(&self) -> Result<Tokens<'_>, Word2VecError> {
        Ok(Box::new(self.iter().map(|t| Ok(t.to_string()))))
    }
}

/// Whitespace-separated tokens read from a text file.
#[derive(Clone, Debug)]
pub struct TextFileSource {
    path: PathBuf,
}

impl TextFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenSource for TextFileSource {
    fn open(&self) -> Result<Tokens<'_>, Word2VecError> {
        let reader = BufReader::new(File::open(&self.path)?);
        Ok(Box::new(reader.lines().flat_map(|line| match line {
            Ok(line) => line
                .split_whitespace()
                .map(|t| Ok(t.to_string()))
                .collect::<Vec<_>>(),
            Err(err) => vec![Err(err)],
        })))
    }
}

/// Wraps an iterator that can only be consumed once.
pub struct OnceSource<I> {
    inner: Mutex<Option<I>>,
}

impl<I> OnceSource<I>
where
    I: Iterator<Item = String> + Send,
{
    pub fn new(tokens: I) -> Self {
        Self {
            inner: Mutex::new(Some(tokens)),
        }
    }
}

impl<I> TokenSource for OnceSource<I>
where
    I: Iterator<Item = String> + Send,
{
    fn open(&self) -> Result<Tokens<'_>, Word2VecError> {
        let tokens = self
            .inner
            .lock()
            .take()
            .ok_or(Word2VecError::SourceExhausted)?;
        Ok(Box::new(tokens.map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn collect(source: &dyn TokenSource) -> Vec<String> {
        source
            .open()
            .unwrap()
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn text_file_splits_on_whitespace() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a  b\tc").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "d").unwrap();

        let source = TextFileSource::new(file.path());
        assert_eq!(collect(&source), vec!["a", "b", "c", "d"]);
        assert_eq!(collect(&source).len(), 4);
    }

    #[test]
    fn missing_file_fails_on_open() {
        let source = TextFileSource::new("/nonexistent/corpus.txt");
        assert!(matches!(source.open(), Err(Word2VecError::Io(_))));
    }

    #[test]
    fn once_source_cannot_replay() {
        let source = OnceSource::new(vec!["x".to_string()].into_iter());
        assert_eq!(collect(&source), vec!["x"]);
        assert!(matches!(source.open(), Err(Word2VecError::SourceExhausted)));
    }
}
