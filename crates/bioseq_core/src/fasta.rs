//! FASTA input.
//!
//! [`FastaSource`] yields `(identifier, sequence)` pairs for
//! [`SequenceDataset::ingest`](crate::SequenceDataset::ingest). Plain and
//! gzip-compressed files are both accepted; FASTQ input is read the same
//! way with qualities ignored.

use crate::error::{CoreError, CoreResult};
use needletail::errors::ParseErrorKind;
use needletail::parser::FastxReader;
use std::io::Read;
use std::path::Path;

/// A lazy reader of `(identifier, sequence)` pairs.
///
/// The identifier is the first whitespace-delimited token of the header
/// line; the sequence is the record's residues with line breaks removed.
pub struct FastaSource {
    reader: Option<Box<dyn FastxReader>>,
}

impl FastaSource {
    /// Opens a FASTA file.
    ///
    /// An empty file is an empty source.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Fasta`] if the file cannot be opened or does
    /// not look like FASTA.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        match needletail::parse_fastx_file(path.as_ref()) {
            Ok(reader) => Ok(Self {
                reader: Some(reader),
            }),
            Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => Ok(Self { reader: None }),
            Err(e) => Err(CoreError::fasta(format!(
                "{}: {e}",
                path.as_ref().display()
            ))),
        }
    }

    /// Reads FASTA from any byte stream.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Fasta`] if the stream does not look like FASTA.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> CoreResult<Self> {
        match needletail::parse_fastx_reader(reader) {
            Ok(reader) => Ok(Self {
                reader: Some(reader),
            }),
            Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => Ok(Self { reader: None }),
            Err(e) => Err(CoreError::fasta(e.to_string())),
        }
    }
}

impl Iterator for FastaSource {
    type Item = CoreResult<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        let item = match reader.next()? {
            Ok(record) => to_pair(record.id(), &record.seq()),
            Err(e) => Err(CoreError::fasta(e.to_string())),
        };
        if item.is_err() {
            // the parser cannot resync after an error
            self.reader = None;
        }
        Some(item)
    }
}

impl std::fmt::Debug for FastaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastaSource")
            .field("finished", &self.reader.is_none())
            .finish()
    }
}

fn to_pair(header: &[u8], residues: &[u8]) -> CoreResult<(String, String)> {
    let header = std::str::from_utf8(header)
        .map_err(|e| CoreError::fasta(format!("header is not UTF-8: {e}")))?;
    let identifier = header.split_whitespace().next().unwrap_or_default();
    let sequence = String::from_utf8(residues.to_vec())
        .map_err(|e| CoreError::fasta(format!("sequence {identifier} is not UTF-8: {e}")))?;
    Ok((identifier.to_owned(), sequence))
}
