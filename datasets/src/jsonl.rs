use memmap2::Mmap;
use std::{fs::File, path::Path};

use crate::Sample;

/// Memory-mapped JSON-lines file of [`Sample`] records.
pub struct MmapSamples {
    mmap: Mmap,
}

impl MmapSamples {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }

    /// Iterates the non-empty lines of the file, decoding each as a sample.
    pub fn iter(&self) -> anyhow::Result<impl Iterator<Item = anyhow::Result<Sample>> + '_> {
        let text = std::str::from_utf8(&self.mmap)?;
        Ok(text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(anyhow::Error::from)))
    }
}
