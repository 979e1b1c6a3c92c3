use std::path::{Path, PathBuf};

use super::WriteSummary;
use crate::{
    error::Result,
    index::IndexMetadata,
    reader::{MemoryBuffers, MemoryReader},
    rolling::{FileKind, RollingWriter},
};

/// Destination of the records accepted by a [`SequencesWriter`](super::SequencesWriter)
///
/// Records arrive validated, in id order, each part with its checksum. For every
/// record the writer calls `write_residues`, then `write_quality` if the store
/// holds quality, then `write_name` and `write_suffix` if it holds names.
pub trait Sink {
    /// Value returned by [`finish`](Sink::finish)
    type Output;

    fn write_residues(&mut self, residues: &[u8], checksum: u8) -> Result<()>;

    fn write_quality(&mut self, quality: &[u8], checksum: u8) -> Result<()>;

    fn write_name(&mut self, label: &str, checksum: u8) -> Result<()>;

    /// Receives every suffix, including empty ones
    fn write_suffix(&mut self, suffix: &str, checksum: u8) -> Result<()>;

    /// Persists the completed metadata
    fn finish(self, metadata: IndexMetadata, summary: WriteSummary) -> Result<Self::Output>;
}

/// Writes rolling files into a store directory
pub struct DiskSink {
    dir: PathBuf,
    max_file_size: u64,
    sequences: RollingWriter,
    quality: Option<RollingWriter>,
    names: Option<RollingWriter>,

    /// Opened with the first non-empty suffix
    suffixes: Option<RollingWriter>,

    /// Suffixes received so far
    num_suffixes: u64,
}
impl DiskSink {
    /// Opens the first data file of every kind the store holds
    pub fn new(dir: &Path, metadata: &IndexMetadata) -> Result<Self> {
        let max_file_size = metadata.max_file_size;
        let open = |kind| RollingWriter::new(dir, kind, max_file_size);
        Ok(Self {
            dir: dir.to_path_buf(),
            max_file_size,
            sequences: open(FileKind::Sequence)?,
            quality: metadata
                .has_quality
                .then(|| open(FileKind::Quality))
                .transpose()?,
            names: metadata
                .has_names
                .then(|| open(FileKind::Name))
                .transpose()?,
            suffixes: None,
            num_suffixes: 0,
        })
    }
}
impl Sink for DiskSink {
    type Output = WriteSummary;

    fn write_residues(&mut self, residues: &[u8], checksum: u8) -> Result<()> {
        self.sequences.write_record(residues, checksum)
    }

    fn write_quality(&mut self, quality: &[u8], checksum: u8) -> Result<()> {
        match &mut self.quality {
            Some(writer) => writer.write_record(quality, checksum),
            None => Ok(()),
        }
    }

    fn write_name(&mut self, label: &str, checksum: u8) -> Result<()> {
        match &mut self.names {
            Some(writer) => writer.write_record(label.as_bytes(), checksum),
            None => Ok(()),
        }
    }

    fn write_suffix(&mut self, suffix: &str, checksum: u8) -> Result<()> {
        if self.suffixes.is_none() && !suffix.is_empty() {
            let mut writer = RollingWriter::new(&self.dir, FileKind::Suffix, self.max_file_size)?;
            writer.write_empty(self.num_suffixes);
            self.suffixes = Some(writer);
        }
        self.num_suffixes += 1;
        match &mut self.suffixes {
            Some(writer) => writer.write_record(suffix.as_bytes(), checksum),
            None => Ok(()),
        }
    }

    fn finish(self, metadata: IndexMetadata, summary: WriteSummary) -> Result<WriteSummary> {
        self.sequences.finish()?;
        for writer in [self.quality, self.names, self.suffixes].into_iter().flatten() {
            writer.finish()?;
        }
        // The index is written last and marks the store as complete
        metadata.save(&self.dir)?;
        Ok(summary)
    }
}

/// A store held in memory, returned by the in-memory writer
pub struct MemoryStore {
    summary: WriteSummary,
    reader: MemoryReader,
}
impl MemoryStore {
    #[must_use]
    pub fn summary(&self) -> &WriteSummary {
        &self.summary
    }

    #[must_use]
    pub fn reader(&self) -> &MemoryReader {
        &self.reader
    }

    #[must_use]
    pub fn into_reader(self) -> MemoryReader {
        self.reader
    }
}

/// Packs records straight into the buffers of a [`MemoryReader`]
pub struct MemorySink {
    buffers: MemoryBuffers,
}
impl MemorySink {
    pub fn new(metadata: &IndexMetadata) -> Result<Self> {
        let mut buffers = MemoryBuffers::new(metadata.sequence_type, 0)?;
        if metadata.has_quality {
            buffers = buffers.with_quality()?;
        }
        if metadata.has_names {
            buffers = buffers.with_names();
        }
        Ok(Self { buffers })
    }
}
impl Sink for MemorySink {
    type Output = MemoryStore;

    fn write_residues(&mut self, residues: &[u8], checksum: u8) -> Result<()> {
        self.buffers.push_residues(residues, checksum)
    }

    fn write_quality(&mut self, quality: &[u8], checksum: u8) -> Result<()> {
        self.buffers.push_quality(quality, checksum)
    }

    fn write_name(&mut self, label: &str, checksum: u8) -> Result<()> {
        self.buffers.push_name(label, checksum);
        Ok(())
    }

    fn write_suffix(&mut self, suffix: &str, checksum: u8) -> Result<()> {
        self.buffers.push_suffix(suffix, checksum);
        Ok(())
    }

    fn finish(self, metadata: IndexMetadata, summary: WriteSummary) -> Result<MemoryStore> {
        Ok(MemoryStore {
            summary,
            reader: MemoryReader::from_buffers(metadata, self.buffers),
        })
    }
}
