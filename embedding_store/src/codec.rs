//! Record-stream codecs for [`EmbeddingMap`].
//!
//! The binary stream is a bincode header (magic, version, record count,
//! dimension) followed by one `(word, vector)` record per entry, so a reader can
//! rebuild the map without any training-time dictionary. The text format is the
//! conventional word2vec layout: an `N dim` header line, then `word v1 … vd`.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{EmbeddingError, EmbeddingMap};

const MAGIC: [u8; 4] = *b"EMBR";
const VERSION: u32 = 1;

/// On-disk layout used by [`save`] and [`load`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingFormat {
    #[default]
    Binary,
    Text,
}

#[derive(Serialize, Deserialize)]
struct StreamHeader {
    magic: [u8; 4],
    version: u32,
    records: u64,
    dimension: u64,
}

#[derive(Serialize)]
struct RecordRef<'a> {
    word: &'a str,
    vector: &'a [f64],
}

#[derive(Deserialize)]
struct Record {
    word: String,
    vector: Vec<f64>,
}

/// Writes every entry of `map` to `writer`, ordered by word.
pub fn save<W: Write>(
    map: &EmbeddingMap,
    writer: W,
    format: EmbeddingFormat,
) -> Result<(), EmbeddingError> {
    let started = Instant::now();
    let mut writer = BufWriter::new(writer);
    match format {
        EmbeddingFormat::Binary => write_binary(map, &mut writer)?,
        EmbeddingFormat::Text => write_text(map, &mut writer)?,
    }
    writer.flush()?;
    debug!(
        records = map.len(),
        ?format,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "embedding map saved"
    );
    Ok(())
}

/// Reads an embedding map written by [`save`] in the same format.
pub fn load<R: Read>(reader: R, format: EmbeddingFormat) -> Result<EmbeddingMap, EmbeddingError> {
    let started = Instant::now();
    let reader = BufReader::new(reader);
    let map = match format {
        EmbeddingFormat::Binary => read_binary(reader)?,
        EmbeddingFormat::Text => read_text(reader)?,
    };
    debug!(
        records = map.len(),
        ?format,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "embedding map loaded"
    );
    Ok(map)
}

fn write_binary<W: Write>(map: &EmbeddingMap, writer: &mut W) -> Result<(), EmbeddingError> {
    let header = StreamHeader {
        magic: MAGIC,
        version: VERSION,
        records: map.len() as u64,
        dimension: map.dimension() as u64,
    };
    bincode::serialize_into(&mut *writer, &header)?;
    for word in map.sorted_words() {
        if let Some(vector) = map.get(word) {
            bincode::serialize_into(&mut *writer, &RecordRef { word, vector })?;
        }
    }
    Ok(())
}

fn read_binary<R: Read>(mut reader: R) -> Result<EmbeddingMap, EmbeddingError> {
    let header: StreamHeader = bincode::deserialize_from(&mut reader)?;
    if header.magic != MAGIC || header.version != VERSION {
        return Err(EmbeddingError::UnsupportedStream {
            magic: header.magic,
            version: header.version,
        });
    }
    let mut map = EmbeddingMap::new(header.dimension as usize);
    for _ in 0..header.records {
        let record: Record = bincode::deserialize_from(&mut reader)?;
        map.insert(record.word, record.vector)?;
    }
    Ok(map)
}

fn write_text<W: Write>(map: &EmbeddingMap, writer: &mut W) -> Result<(), EmbeddingError> {
    writeln!(writer, "{} {}", map.len(), map.dimension())?;
    for word in map.sorted_words() {
        if word.is_empty() || word.chars().any(char::is_whitespace) {
            return Err(EmbeddingError::InvalidWord(word.to_string()));
        }
        write!(writer, "{word}")?;
        if let Some(vector) = map.get(word) {
            for value in vector {
                write!(writer, " {value}")?;
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn read_text<R: BufRead>(reader: R) -> Result<EmbeddingMap, EmbeddingError> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => {
            return Err(EmbeddingError::Malformed {
                line: 1,
                reason: "missing header".to_string(),
            });
        }
    };
    let (records, dimension) = parse_header(&header)?;
    let mut map = EmbeddingMap::new(dimension);

    for (offset, line) in lines.enumerate() {
        let line_no = offset + 2;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let word = fields.next().unwrap_or_default().to_string();
        let vector = fields
            .map(|field| {
                field.parse::<f64>().map_err(|err| EmbeddingError::Malformed {
                    line: line_no,
                    reason: format!("{field}: {err}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        map.insert(word, vector)?;
    }

    if map.len() != records {
        return Err(EmbeddingError::Malformed {
            line: 1,
            reason: format!("header declares {records} records, found {}", map.len()),
        });
    }
    Ok(map)
}

fn parse_header(header: &str) -> Result<(usize, usize), EmbeddingError> {
    let malformed = |reason: &str| EmbeddingError::Malformed {
        line: 1,
        reason: reason.to_string(),
    };
    let mut fields = header.split_whitespace();
    let records = fields
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| malformed("record count"))?;
    let dimension = fields
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| malformed("dimension"))?;
    Ok((records, dimension))
}
