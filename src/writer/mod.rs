//! Writing stores
//!
//! [`SequencesWriter`] takes records one at a time in id order, computes every
//! statistic of the index in the same pass, and hands the encoded record to a
//! [`Sink`]: [`DiskSink`] for rolling files on disk, [`MemorySink`] for a store
//! that only lives in memory. Both produce the same logical content and the same
//! checksums.
//!
//! ```no_run
//! use sdfstore::{SdfWriterBuilder, SequenceType};
//!
//! let mut writer = SdfWriterBuilder::default()
//!     .sequence_type(SequenceType::Dna)
//!     .quality(true)
//!     .build("reads.sdf")?;
//! writer.write(Some("read1 sample=a"), &[1, 2, 3, 4], Some(&[30, 30, 31, 12]))?;
//! let summary = writer.finish()?;
//! assert_eq!(summary.number_sequences, 1);
//! # Ok::<(), sdfstore::Error>(())
//! ```

mod sink;

pub use sink::{DiskSink, MemorySink, MemoryStore, Sink};

use std::{fs, path::Path};

use crate::{
    alphabet::SequenceType,
    error::{ReadError, Result, WriteError},
    index::{IndexMetadata, DEFAULT_MAX_FILE_SIZE, MAX_FILE_SIZE, MAX_QUALITY, MIN_FILE_SIZE},
    names::{NameHandler, WarningCounter},
    policy::ResiduePolicy,
    source::SequenceDataSource,
    stats::Statistics,
};

/// Longest record the writer accepts
pub const MAX_SEQUENCE_LENGTH: u64 = u32::MAX as u64;

/// Counters reported when a store is finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub number_sequences: u64,
    pub total_length: u64,
    pub store_id: u64,

    /// Records that received a generated name
    pub unnamed: u64,

    /// Labels truncated to the maximum label length
    pub truncated_names: u64,

    /// Records without residues
    pub zero_length: u64,

    /// Records with at least one quality value clipped to the maximum
    pub clipped_quality: u64,
}

/// A builder for creating configured [`SequencesWriter`] instances
///
/// Every option has a default: DNA, no quality, names enabled, 2 GiB files,
/// [`ResiduePolicy::Reject`] and a random store id.
#[derive(Debug, Clone, Default)]
pub struct SdfWriterBuilder {
    /// Alphabet of the store
    sequence_type: Option<SequenceType>,
    /// Store quality values
    quality: Option<bool>,
    /// Store names
    names: Option<bool>,
    /// Cap on the size of each rolling file
    max_file_size: Option<u64>,
    /// Handling of residue codes outside the alphabet
    policy: Option<ResiduePolicy>,
    comment: Option<String>,
    command_line: Option<String>,
    read_group: Option<String>,
    store_id: Option<u64>,
}
impl SdfWriterBuilder {
    #[must_use]
    pub fn sequence_type(mut self, sequence_type: SequenceType) -> Self {
        self.sequence_type = Some(sequence_type);
        self
    }

    #[must_use]
    pub fn quality(mut self, quality: bool) -> Self {
        self.quality = Some(quality);
        self
    }

    #[must_use]
    pub fn names(mut self, names: bool) -> Self {
        self.names = Some(names);
        self
    }

    /// Cap on the size of each rolling file, checked by the terminal methods
    #[must_use]
    pub fn max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = Some(max_file_size);
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: ResiduePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    #[must_use]
    pub fn command_line(mut self, command_line: impl Into<String>) -> Self {
        self.command_line = Some(command_line.into());
        self
    }

    #[must_use]
    pub fn read_group(mut self, read_group: impl Into<String>) -> Self {
        self.read_group = Some(read_group.into());
        self
    }

    /// Fixed identity token instead of a random one
    #[must_use]
    pub fn store_id(mut self, store_id: u64) -> Self {
        self.store_id = Some(store_id);
        self
    }

    /// Index metadata of the empty store described by the options
    fn metadata(&self) -> Result<IndexMetadata> {
        let max_file_size = self.max_file_size.unwrap_or(DEFAULT_MAX_FILE_SIZE);
        if !(MIN_FILE_SIZE..=MAX_FILE_SIZE).contains(&max_file_size) {
            return Err(WriteError::SizeLimit {
                limit: max_file_size,
                min: MIN_FILE_SIZE,
                max: MAX_FILE_SIZE,
            }
            .into());
        }
        let mut metadata =
            IndexMetadata::new(self.sequence_type.unwrap_or_default(), max_file_size);
        metadata.has_quality = self.quality.unwrap_or(false);
        metadata.has_names = self.names.unwrap_or(true);
        metadata.store_id = self.store_id.unwrap_or_else(rand::random);
        metadata.comment.clone_from(&self.comment);
        metadata.command_line.clone_from(&self.command_line);
        metadata.read_group.clone_from(&self.read_group);
        Ok(metadata)
    }

    /// Creates a writer producing a store in `dir`
    ///
    /// The directory is created if it does not exist.
    pub fn build<P: AsRef<Path>>(self, dir: P) -> Result<SequencesWriter<DiskSink>> {
        let dir = dir.as_ref();
        let metadata = self.metadata()?;
        if dir.exists() && !dir.is_dir() {
            return Err(WriteError::NotADirectory(dir.to_path_buf()).into());
        }
        fs::create_dir_all(dir)?;
        let sink = DiskSink::new(dir, &metadata)?;
        Ok(SequencesWriter::new(sink, metadata, self.policy.unwrap_or_default()))
    }

    /// Creates a writer producing a store held in memory
    pub fn build_in_memory(self) -> Result<SequencesWriter<MemorySink>> {
        let metadata = self.metadata()?;
        let sink = MemorySink::new(&metadata)?;
        Ok(SequencesWriter::new(sink, metadata, self.policy.unwrap_or_default()))
    }
}

/// Streaming writer of a store
///
/// Records are validated completely before any of their bytes reach the sink, so
/// a rejected record leaves the store unchanged and the writer usable.
pub struct SequencesWriter<S: Sink> {
    sink: S,
    metadata: IndexMetadata,
    policy: ResiduePolicy,
    stats: Statistics,
    names: NameHandler,

    /// Set once any record carries a non-empty suffix
    has_suffixes: bool,

    zero_length: WarningCounter,
    clipped_quality: WarningCounter,

    /// Residues corrected by the policy
    rbuf: Vec<u8>,

    /// Clipped quality values
    qbuf: Vec<u8>,
}
impl<S: Sink> SequencesWriter<S> {
    pub fn new(sink: S, metadata: IndexMetadata, policy: ResiduePolicy) -> Self {
        Self {
            sink,
            stats: Statistics::new(metadata.sequence_type),
            metadata,
            policy,
            names: NameHandler::new(),
            has_suffixes: false,
            zero_length: WarningCounter::new("sequence with zero length"),
            clipped_quality: WarningCounter::new("quality value above the maximum clipped"),
            rbuf: Vec::new(),
            qbuf: Vec::new(),
        }
    }

    #[must_use]
    pub fn sequence_type(&self) -> SequenceType {
        self.metadata.sequence_type
    }

    /// Number of records written so far
    #[must_use]
    pub fn number_sequences(&self) -> u64 {
        self.stats.number_sequences()
    }

    /// Writes one record
    ///
    /// # Arguments
    /// * `name` - Full name, split into label and suffix at the first whitespace
    /// * `residues` - Residue codes of the store's alphabet
    /// * `quality` - Quality values, required when the store holds quality
    pub fn write(
        &mut self,
        name: Option<&str>,
        residues: &[u8],
        quality: Option<&[u8]>,
    ) -> Result<()> {
        let length = residues.len() as u64;
        if length > MAX_SEQUENCE_LENGTH {
            return Err(WriteError::SequenceTooLong {
                got: length,
                max: MAX_SEQUENCE_LENGTH,
            }
            .into());
        }
        let quality = if self.metadata.has_quality {
            let quality = quality.ok_or(WriteError::MissingQuality)?;
            if quality.len() != residues.len() {
                return Err(WriteError::QualityLengthMismatch {
                    residues: residues.len(),
                    quality: quality.len(),
                }
                .into());
            }
            Some(quality)
        } else {
            None
        };
        let residues = self
            .policy
            .handle(residues, self.metadata.sequence_type, &mut self.rbuf)?
            .unwrap_or(residues);
        let label = if self.metadata.has_names {
            Some(self.names.handle(name)?)
        } else {
            None
        };

        // The record is accepted from here on
        if residues.is_empty() {
            self.zero_length
                .warn(&format!("record {}", self.stats.number_sequences()));
        }
        let checksum = self.stats.add_residues(residues);
        self.sink.write_residues(residues, checksum)?;

        if let Some(quality) = quality {
            self.qbuf.clear();
            self.qbuf.extend(quality.iter().map(|&q| q.min(MAX_QUALITY)));
            if quality.iter().any(|&q| q > MAX_QUALITY) {
                self.clipped_quality.warn(&format!(
                    "record {}",
                    self.stats.number_sequences() - 1
                ));
            }
            let checksum = self.stats.add_quality(&self.qbuf);
            self.sink.write_quality(&self.qbuf, checksum)?;
        }

        if let Some(label) = label {
            let checksum = self.stats.add_name(label.label.as_bytes());
            self.sink.write_name(&label.label, checksum)?;
            let checksum = self.stats.add_suffix(label.suffix.as_bytes());
            self.has_suffixes |= !label.suffix.is_empty();
            self.sink.write_suffix(&label.suffix, checksum)?;
        }
        Ok(())
    }

    /// Writes every remaining record of `source`
    ///
    /// Returns the number of records written.
    pub fn write_source<D: SequenceDataSource>(&mut self, mut source: D) -> Result<u64> {
        if source.sequence_type() != self.metadata.sequence_type {
            return Err(ReadError::UnsupportedSequenceType {
                expected: self.metadata.sequence_type.name(),
                found: source.sequence_type().name(),
            }
            .into());
        }
        let mut n = 0;
        while source.advance()? {
            self.write(source.name(), source.residues(), source.quality())?;
            n += 1;
        }
        Ok(n)
    }

    /// Completes the store and writes its index
    pub fn finish(mut self) -> Result<S::Output> {
        self.stats.apply(&mut self.metadata);
        self.metadata.has_suffixes = self.has_suffixes;
        self.names.summarize();
        self.zero_length.summarize();
        self.clipped_quality.summarize();

        let summary = WriteSummary {
            number_sequences: self.metadata.number_sequences,
            total_length: self.metadata.total_length,
            store_id: self.metadata.store_id,
            unnamed: self.names.unnamed(),
            truncated_names: self.names.truncated(),
            zero_length: self.zero_length.count(),
            clipped_quality: self.clipped_quality.count(),
        };
        log::info!(
            "Finished store {:#018x} with {} sequences and {} residues",
            summary.store_id,
            summary.number_sequences,
            summary.total_length
        );
        self.sink.finish(self.metadata, summary)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::reader::{DiskReader, SequencesReader};

    #[test]
    fn test_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        for limit in [0, 19, MAX_FILE_SIZE + 1] {
            let err = SdfWriterBuilder::default()
                .max_file_size(limit)
                .build(dir.path().join("store"))
                .err()
                .unwrap();
            assert!(err.is_size_limit());
        }
        assert!(!dir.path().join("store").exists());
        assert!(SdfWriterBuilder::default().max_file_size(20).build_in_memory().is_ok());
    }

    #[test]
    fn test_not_a_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("file");
        fs::write(&file, b"x")?;
        assert!(SdfWriterBuilder::default().build(&file).is_err());
        Ok(())
    }

    #[test]
    fn test_rejected_records_leave_store_unchanged() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut writer = SdfWriterBuilder::default()
            .quality(true)
            .max_file_size(64)
            .build(dir.path())?;
        writer.write(Some("ok"), &[1, 2], Some(&[3, 4]))?;
        assert!(writer.write(Some("bad"), &[1, 9], Some(&[3, 4])).is_err());
        assert!(writer.write(Some("short"), &[1, 2], Some(&[3])).is_err());
        assert!(writer.write(Some("none"), &[1, 2], None).is_err());
        assert!(writer.write(Some("*star"), &[1, 2], Some(&[3, 4])).is_err());
        writer.write(Some("ok2"), &[3], Some(&[70]))?;
        let summary = writer.finish()?;
        assert_eq!(summary.number_sequences, 2);
        assert_eq!(summary.clipped_quality, 1);

        let reader = DiskReader::open(dir.path())?;
        assert_eq!(reader.number_sequences(), 2);
        assert_eq!(reader.name(1)?, "ok2");
        assert_eq!(reader.read_quality_vec(1)?, vec![MAX_QUALITY]);
        Ok(())
    }

    #[test]
    fn test_policy_and_unnamed() -> Result<()> {
        let mut writer = SdfWriterBuilder::default()
            .policy(ResiduePolicy::SetToUnknown)
            .store_id(7)
            .comment("unit test")
            .build_in_memory()?;
        writer.write(None, &[1, 9, 2], None)?;
        writer.write(Some(""), &[], None)?;
        let store = writer.finish()?;
        assert_eq!(store.summary().unnamed, 2);
        assert_eq!(store.summary().zero_length, 1);

        let reader = store.into_reader();
        assert_eq!(reader.store_id(), 7);
        assert_eq!(reader.index().comment.as_deref(), Some("unit test"));
        assert_eq!(reader.read_vec(0)?, vec![1, 0, 2]);
        assert_eq!(reader.name(0)?, "Unnamed_sequence_0");
        assert_eq!(reader.name(1)?, "Unnamed_sequence_1");
        Ok(())
    }

    #[test]
    fn test_without_names() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut writer = SdfWriterBuilder::default().names(false).build(dir.path())?;
        writer.write(Some("ignored"), &[1, 2, 3], None)?;
        writer.finish()?;
        let reader = DiskReader::open(dir.path())?;
        assert!(!reader.has_names());
        assert!(reader.name(0).is_err());
        assert!(!crate::rolling::FileKind::Name.index_path(dir.path()).exists());
        Ok(())
    }
}
