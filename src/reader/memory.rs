use std::{
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use super::{check_id, check_request, check_span, Cursor, IdRange, LoadRange, SequencesReader};
use crate::{
    alphabet::SequenceType,
    bitpack::BitPackedArray,
    checksum::record_checksum,
    error::{CorruptStoreError, ReadError, Result},
    index::{IndexMetadata, MAX_QUALITY, QUALITY_BITS},
    names::NameArena,
    rolling::{FileKind, RollingSet},
};

/// Packed quality values of a range of records
#[derive(Debug, Clone)]
pub(crate) struct QualityBuffer {
    values: BitPackedArray,
    checksums: Vec<u8>,
}
impl QualityBuffer {
    /// Empty buffer with room for `capacity` quality values
    pub(crate) fn new(capacity: u64) -> Result<Self> {
        Ok(Self {
            values: BitPackedArray::with_capacity(QUALITY_BITS, capacity)?,
            checksums: Vec::new(),
        })
    }

    pub(crate) fn push(&mut self, quality: &[u8], checksum: u8) -> Result<()> {
        self.values.extend_from_slice(quality)?;
        self.checksums.push(checksum);
        Ok(())
    }
}

/// In-memory contents of a range of records
///
/// Shared by the memory reader and the in-memory writer, which fills it record by
/// record.
#[derive(Debug, Clone)]
pub(crate) struct MemoryBuffers {
    residues: BitPackedArray,
    /// `positions[i]..positions[i + 1]` delimits record `i` in `residues`
    positions: Vec<u64>,
    checksums: Vec<u8>,
    quality: Option<QualityBuffer>,
    names: Option<NameArena>,
    suffixes: Option<NameArena>,
}
impl MemoryBuffers {
    /// Empty buffers with room for `capacity` residues
    pub(crate) fn new(sequence_type: SequenceType, capacity: u64) -> Result<Self> {
        Ok(Self {
            residues: BitPackedArray::with_capacity(sequence_type.bits(), capacity)?,
            positions: vec![0],
            checksums: Vec::new(),
            quality: None,
            names: None,
            suffixes: None,
        })
    }

    pub(crate) fn with_quality(mut self) -> Result<Self> {
        self.quality = Some(QualityBuffer::new(0)?);
        Ok(self)
    }

    pub(crate) fn with_names(mut self) -> Self {
        self.names = Some(NameArena::new());
        self.suffixes = Some(NameArena::new());
        self
    }

    pub(crate) fn len(&self) -> u64 {
        self.checksums.len() as u64
    }

    pub(crate) fn push_residues(&mut self, residues: &[u8], checksum: u8) -> Result<()> {
        self.residues.extend_from_slice(residues)?;
        self.positions.push(self.residues.len());
        self.checksums.push(checksum);
        Ok(())
    }

    pub(crate) fn push_quality(&mut self, quality: &[u8], checksum: u8) -> Result<()> {
        match &mut self.quality {
            Some(buffer) => buffer.push(quality, checksum),
            None => Err(ReadError::Unavailable("quality data").into()),
        }
    }

    pub(crate) fn push_name(&mut self, label: &str, checksum: u8) {
        if let Some(names) = &mut self.names {
            names.push(label.as_bytes(), checksum);
        }
    }

    pub(crate) fn push_suffix(&mut self, suffix: &str, checksum: u8) {
        if let Some(suffixes) = &mut self.suffixes {
            suffixes.push(suffix.as_bytes(), checksum);
        }
    }

    /// Approximate heap footprint in bytes
    fn bytes(&self) -> usize {
        self.residues.bytes()
            + self.positions.len() * 8
            + self.checksums.len()
            + self
                .quality
                .as_ref()
                .map_or(0, |q| q.values.bytes() + q.checksums.len())
            + self.names.as_ref().map_or(0, NameArena::bytes)
            + self.suffixes.as_ref().map_or(0, NameArena::bytes)
    }
}

/// Immutable state shared between copies of a [`MemoryReader`]
struct MemoryData {
    dir: Option<PathBuf>,
    index: IndexMetadata,
    range: IdRange,
    buffers: MemoryBuffers,

    /// Quality loaded on first use when loading was delayed
    delayed_quality: OnceLock<QualityBuffer>,
    check_integrity: bool,
}

/// Reader holding a range of a store in bit-packed memory buffers
///
/// Residue codes are packed with the width of the alphabet and quality values
/// with 6 bits. Reads decode from the buffers and never touch the disk, except for
/// the first quality access when quality loading was delayed.
pub struct MemoryReader {
    data: Arc<MemoryData>,
    cursor: Cursor,
}

/// Options for loading a store into a [`MemoryReader`]
#[derive(Debug, Clone, Copy)]
pub struct MemoryReaderBuilder {
    range: LoadRange,
    delay_quality: bool,
    check_integrity: bool,
    load_names: bool,
}
impl Default for MemoryReaderBuilder {
    fn default() -> Self {
        Self {
            range: LoadRange::full(),
            delay_quality: false,
            check_integrity: false,
            load_names: true,
        }
    }
}
impl MemoryReaderBuilder {
    /// Records to load (default: the whole store)
    #[must_use]
    pub fn range(mut self, range: LoadRange) -> Self {
        self.range = range;
        self
    }

    /// Defer loading quality values until they are first read
    #[must_use]
    pub fn delay_quality(mut self, delay_quality: bool) -> Self {
        self.delay_quality = delay_quality;
        self
    }

    /// Compare every loaded record against its stored checksum
    #[must_use]
    pub fn check_integrity(mut self, check_integrity: bool) -> Self {
        self.check_integrity = check_integrity;
        self
    }

    /// Load name labels and suffixes (default: true)
    #[must_use]
    pub fn load_names(mut self, load_names: bool) -> Self {
        self.load_names = load_names;
        self
    }

    /// Loads the store at `dir`
    pub fn open<P: AsRef<Path>>(self, dir: P) -> Result<MemoryReader> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CorruptStoreError::MissingFile(dir.to_path_buf()).into());
        }
        let index = IndexMetadata::load(dir)?;
        let range = self.range.resolve(index.number_sequences)?;
        let sequence_type = index.sequence_type;
        let open = |kind| RollingSet::open(dir, kind, range.start, range.end, index.number_sequences);

        let sequences = open(FileKind::Sequence)?;
        let mut buffers = MemoryBuffers::new(sequence_type, total_length(&sequences)?)?;
        for id in 0..sequences.len() {
            let residues = sequences.read_vec(id)?;
            let global = range.start + id;
            if let Some(&code) = residues.iter().find(|&&c| !sequence_type.is_valid_code(c)) {
                return Err(CorruptStoreError::InvalidResidue {
                    id: global,
                    code,
                    codes: sequence_type.num_codes(),
                }
                .into());
            }
            let checksum = stored_checksum(&sequences, id)?;
            check_record(self.check_integrity, &residues, checksum, global)?;
            buffers.push_residues(&residues, checksum)?;
        }

        if index.has_quality && !self.delay_quality {
            buffers.quality = Some(load_quality(dir, &index, range, self.check_integrity)?);
        }
        if index.has_names && self.load_names {
            buffers.names = Some(load_names(dir, FileKind::Name, &index, range, self.check_integrity)?);
            if index.has_suffixes {
                buffers.suffixes =
                    Some(load_names(dir, FileKind::Suffix, &index, range, self.check_integrity)?);
            }
        }
        log::debug!(
            "Loaded {} records [{}, {}) of {} into {} bytes",
            range.len(),
            range.start,
            range.end,
            dir.display(),
            buffers.bytes()
        );

        Ok(MemoryReader {
            data: Arc::new(MemoryData {
                dir: Some(dir.to_path_buf()),
                index,
                range,
                buffers,
                delayed_quality: OnceLock::new(),
                check_integrity: self.check_integrity,
            }),
            cursor: Cursor::default(),
        })
    }
}

/// Number of bytes held by every record of `set`
fn total_length(set: &RollingSet) -> Result<u64> {
    set.length_between(0, set.len())
        .ok_or(CorruptStoreError::UnexpectedEnd("pointer table").into())
}

fn stored_checksum(set: &RollingSet, id: u64) -> Result<u8> {
    set.checksum(id)
        .ok_or(CorruptStoreError::UnexpectedEnd("pointer table").into())
}

fn check_record(enabled: bool, bytes: &[u8], stored: u8, global: u64) -> Result<()> {
    if enabled && record_checksum(bytes) != stored {
        return Err(CorruptStoreError::RecordChecksumMismatch(global).into());
    }
    Ok(())
}

fn load_quality(
    dir: &Path,
    index: &IndexMetadata,
    range: IdRange,
    check_integrity: bool,
) -> Result<QualityBuffer> {
    let set = RollingSet::open(
        dir,
        FileKind::Quality,
        range.start,
        range.end,
        index.number_sequences,
    )?;
    let mut buffer = QualityBuffer::new(total_length(&set)?)?;
    for id in 0..set.len() {
        let quality = set.read_vec(id)?;
        let global = range.start + id;
        if let Some(&value) = quality.iter().find(|&&q| q > MAX_QUALITY) {
            return Err(CorruptStoreError::InvalidQuality { id: global, value }.into());
        }
        let checksum = stored_checksum(&set, id)?;
        check_record(check_integrity, &quality, checksum, global)?;
        buffer.push(&quality, checksum)?;
    }
    Ok(buffer)
}

fn load_names(
    dir: &Path,
    kind: FileKind,
    index: &IndexMetadata,
    range: IdRange,
    check_integrity: bool,
) -> Result<NameArena> {
    let set = RollingSet::open(dir, kind, range.start, range.end, index.number_sequences)?;
    let mut arena = NameArena::new();
    for id in 0..set.len() {
        let name = set.read_vec(id)?;
        let global = range.start + id;
        if std::str::from_utf8(&name).is_err() {
            return Err(CorruptStoreError::InvalidName(global).into());
        }
        let checksum = stored_checksum(&set, id)?;
        check_record(check_integrity, &name, checksum, global)?;
        arena.push(&name, checksum);
    }
    Ok(arena)
}

impl MemoryReader {
    /// Loads the whole store at `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        MemoryReaderBuilder::default().open(dir)
    }

    /// Loads the records of `range` of the store at `dir`
    pub fn open_range<P: AsRef<Path>>(dir: P, range: LoadRange) -> Result<Self> {
        MemoryReaderBuilder::default().range(range).open(dir)
    }

    /// Wraps buffers filled by the in-memory writer
    pub(crate) fn from_buffers(index: IndexMetadata, buffers: MemoryBuffers) -> Self {
        let range = IdRange::full(buffers.len());
        Self {
            data: Arc::new(MemoryData {
                dir: None,
                index,
                range,
                buffers,
                delayed_quality: OnceLock::new(),
                check_integrity: false,
            }),
            cursor: Cursor::default(),
        }
    }

    /// Approximate heap footprint of the loaded buffers in bytes
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.data.buffers.bytes()
    }

    fn quality(&self) -> Result<&QualityBuffer> {
        if let Some(buffer) = &self.data.buffers.quality {
            return Ok(buffer);
        }
        if let Some(buffer) = self.data.delayed_quality.get() {
            return Ok(buffer);
        }
        let (Some(dir), true) = (&self.data.dir, self.data.index.has_quality) else {
            return Err(ReadError::Unavailable("quality data").into());
        };
        let loaded = load_quality(dir, &self.data.index, self.data.range, self.data.check_integrity)?;
        // Another copy may have won the race; both loaded the same values
        let _ = self.data.delayed_quality.set(loaded);
        self.data
            .delayed_quality
            .get()
            .ok_or(ReadError::Unavailable("quality data").into())
    }

    fn names(&self) -> Result<&NameArena> {
        self.data
            .buffers
            .names
            .as_ref()
            .ok_or(ReadError::Unavailable("sequence names").into())
    }

    /// Start of record `id` in the packed buffers
    fn position(&self, id: u64) -> Result<u64> {
        check_id(id, self.number_sequences())?;
        Ok(self.data.buffers.positions[id as usize])
    }
}

impl SequencesReader for MemoryReader {
    fn index(&self) -> &IndexMetadata {
        &self.data.index
    }

    fn range(&self) -> IdRange {
        self.data.range
    }

    fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    /// False when names were left out with [`MemoryReaderBuilder::load_names`]
    fn has_names(&self) -> bool {
        self.data.buffers.names.is_some()
    }

    fn length(&self, id: u64) -> Result<u64> {
        let start = self.position(id)?;
        Ok(self.data.buffers.positions[id as usize + 1] - start)
    }

    fn name(&self, id: u64) -> Result<String> {
        check_id(id, self.number_sequences())?;
        self.names()?
            .get(id as usize)
            .map(str::to_string)
            .ok_or(CorruptStoreError::InvalidName(self.data.range.start + id).into())
    }

    fn name_suffix(&self, id: u64) -> Result<String> {
        check_id(id, self.number_sequences())?;
        match &self.data.buffers.suffixes {
            Some(suffixes) => suffixes
                .get(id as usize)
                .map(str::to_string)
                .ok_or(CorruptStoreError::InvalidName(self.data.range.start + id).into()),
            None => Ok(String::new()),
        }
    }

    fn read_range(&self, id: u64, out: &mut [u8], start: u64, length: u64) -> Result<usize> {
        let sequence_length = self.length(id)?;
        check_request(start, length, sequence_length, out.len())?;
        let length = length as usize;
        self.data
            .buffers
            .residues
            .copy_range(self.position(id)? + start, &mut out[..length])?;
        Ok(length)
    }

    fn read_quality_range(
        &self,
        id: u64,
        out: &mut [u8],
        start: u64,
        length: u64,
    ) -> Result<usize> {
        let quality = self.quality()?;
        let sequence_length = self.length(id)?;
        check_request(start, length, sequence_length, out.len())?;
        let length = length as usize;
        quality
            .values
            .copy_range(self.position(id)? + start, &mut out[..length])?;
        Ok(length)
    }

    fn data_checksum(&self, id: u64) -> Result<u8> {
        check_id(id, self.number_sequences())?;
        Ok(self.data.buffers.checksums[id as usize])
    }

    fn quality_checksum(&self, id: u64) -> Result<u8> {
        let quality = self.quality()?;
        check_id(id, self.number_sequences())?;
        Ok(quality.checksums[id as usize])
    }

    fn name_checksum(&self, id: u64) -> Result<u8> {
        let names = self.names()?;
        check_id(id, self.number_sequences())?;
        names
            .checksum(id as usize)
            .ok_or(CorruptStoreError::UnexpectedEnd("name checksums").into())
    }

    fn suffix_checksum(&self, id: u64) -> Result<u8> {
        check_id(id, self.number_sequences())?;
        match &self.data.buffers.suffixes {
            Some(suffixes) => suffixes
                .checksum(id as usize)
                .ok_or(CorruptStoreError::UnexpectedEnd("suffix checksums").into()),
            None => Ok(record_checksum(&[])),
        }
    }

    fn path(&self) -> Option<&Path> {
        self.data.dir.as_deref()
    }

    fn copy(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            cursor: Cursor::default(),
        }
    }

    fn length_between(&self, start: u64, end: u64) -> Result<u64> {
        check_span(start, end, self.number_sequences())?;
        let positions = &self.data.buffers.positions;
        Ok(positions[end as usize] - positions[start as usize])
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::{reader::DiskReader, writer::SdfWriterBuilder};

    fn write_protein(dir: &Path) -> Result<()> {
        let mut writer = SdfWriterBuilder::default()
            .sequence_type(SequenceType::Protein)
            .quality(true)
            .max_file_size(32)
            .build(dir)?;
        for i in 0..20u8 {
            let residues: Vec<u8> = (0..i * 3).map(|k| k % 22).collect();
            let quality: Vec<u8> = (0..i * 3).map(|k| k % 64).collect();
            writer.write(Some(&format!("prot{i} chain {i}")), &residues, Some(&quality))?;
        }
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn test_matches_disk_reader() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_protein(dir.path())?;
        let disk = DiskReader::open(dir.path())?;
        let memory = MemoryReader::open(dir.path())?;
        assert_eq!(memory.number_sequences(), 20);
        for id in 0..20 {
            assert_eq!(memory.read_vec(id)?, disk.read_vec(id)?);
            assert_eq!(memory.read_quality_vec(id)?, disk.read_quality_vec(id)?);
            assert_eq!(memory.full_name(id)?, disk.full_name(id)?);
            assert_eq!(memory.data_checksum(id)?, disk.data_checksum(id)?);
            assert_eq!(memory.quality_checksum(id)?, disk.quality_checksum(id)?);
        }
        assert_eq!(memory.length_between(3, 9)?, disk.length_between(3, 9)?);
        Ok(())
    }

    #[test]
    fn test_range_and_options() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_protein(dir.path())?;
        let reader = MemoryReaderBuilder::default()
            .range(LoadRange::new(5, 8))
            .delay_quality(true)
            .check_integrity(true)
            .load_names(false)
            .open(dir.path())?;
        assert_eq!(reader.number_sequences(), 3);
        assert_eq!(reader.length(0)?, 15);
        assert_eq!(reader.read_quality_vec(2)?.len(), 21);
        assert!(reader.name(0).is_err());
        assert!(!reader.has_names());

        let copy = reader.copy();
        assert_eq!(copy.read_quality_vec(0)?, reader.read_quality_vec(0)?);
        Ok(())
    }

    #[test]
    fn test_packed_arrays_are_presized() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_protein(dir.path())?;
        let reader = MemoryReader::open(dir.path())?;
        let total = reader.length_between(0, 20)?;
        assert_eq!(total, (0..20u64).map(|i| i * 3).sum::<u64>());

        let buffers = &reader.data.buffers;
        let quality = buffers.quality.as_ref().unwrap();
        for array in [&buffers.residues, &quality.values] {
            assert_eq!(array.len(), total);
            assert!(array.capacity() >= total);
            assert!(array.capacity() < total + 64);
        }
        Ok(())
    }

    #[test]
    fn test_invalid_residue_is_corrupt() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut writer = SdfWriterBuilder::default().max_file_size(1024).build(dir.path())?;
        writer.write(Some("a"), &[1, 2, 3], None)?;
        writer.finish()?;

        let path = FileKind::Sequence.data_path(dir.path(), 0);
        std::fs::write(&path, [1, 9, 3])?;
        let err = MemoryReader::open(dir.path()).err().unwrap();
        assert!(err.is_corrupt());
        Ok(())
    }

    #[test]
    fn test_integrity_check() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut writer = SdfWriterBuilder::default().max_file_size(1024).build(dir.path())?;
        writer.write(Some("a"), &[1, 2, 3], None)?;
        writer.finish()?;

        let path = FileKind::Sequence.data_path(dir.path(), 0);
        std::fs::write(&path, [1, 3, 3])?;
        assert!(MemoryReader::open(dir.path()).is_ok());
        let err = MemoryReaderBuilder::default()
            .check_integrity(true)
            .open(dir.path())
            .err()
            .unwrap();
        assert!(err.is_corrupt());
        Ok(())
    }
}
