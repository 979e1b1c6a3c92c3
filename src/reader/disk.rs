use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use super::{check_id, check_request, check_span, Cursor, IdRange, LoadRange, SequencesReader};
use crate::{
    checksum::record_checksum,
    error::{CorruptStoreError, ReadError, Result},
    index::IndexMetadata,
    rolling::{FileKind, RollingSet},
};

/// Immutable state shared between copies of a [`DiskReader`]
struct DiskStore {
    dir: PathBuf,
    index: IndexMetadata,
    range: IdRange,
    sequences: RollingSet,
    quality: Option<RollingSet>,
    names: Option<RollingSet>,
    suffixes: Option<RollingSet>,
}

/// Reader over a store on disk
///
/// Opening validates the index, the rolling indices and the pointer tables of the
/// requested range and memory-maps the data files; record bytes are only read
/// when requested.
pub struct DiskReader {
    store: Arc<DiskStore>,
    cursor: Cursor,
}
impl DiskReader {
    /// Opens the whole store at `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open_range(dir, LoadRange::full())
    }

    /// Opens the records of `range` of the store at `dir`
    pub fn open_range<P: AsRef<Path>>(dir: P, range: LoadRange) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CorruptStoreError::MissingFile(dir.to_path_buf()).into());
        }
        let index = IndexMetadata::load(dir)?;
        let count = index.number_sequences;
        let range = range.resolve(count)?;
        let open = |kind| RollingSet::open(dir, kind, range.start, range.end, count);

        let sequences = open(FileKind::Sequence)?;
        if range.covers(count) && sequences.length_between(0, sequences.len()) != Some(index.total_length)
        {
            return Err(CorruptStoreError::PointerTableInconsistent(format!(
                "sequence lengths do not sum to the indexed total of {}",
                index.total_length
            ))
            .into());
        }
        let quality = if index.has_quality {
            let set = open(FileKind::Quality)?;
            check_parallel_lengths(&sequences, &set)?;
            Some(set)
        } else {
            None
        };
        let names = if index.has_names {
            Some(open(FileKind::Name)?)
        } else {
            None
        };
        let suffixes = if index.has_names && index.has_suffixes {
            Some(open(FileKind::Suffix)?)
        } else {
            None
        };
        log::debug!(
            "Opened {} records [{}, {}) of {}",
            range.len(),
            range.start,
            range.end,
            dir.display()
        );

        Ok(Self {
            store: Arc::new(DiskStore {
                dir: dir.to_path_buf(),
                index,
                range,
                sequences,
                quality,
                names,
                suffixes,
            }),
            cursor: Cursor::default(),
        })
    }

    fn quality_set(&self) -> Result<&RollingSet> {
        self.store
            .quality
            .as_ref()
            .ok_or(ReadError::Unavailable("quality data").into())
    }

    fn name_set(&self) -> Result<&RollingSet> {
        self.store
            .names
            .as_ref()
            .ok_or(ReadError::Unavailable("sequence names").into())
    }

    fn read_string(&self, set: &RollingSet, id: u64) -> Result<String> {
        check_id(id, self.number_sequences())?;
        String::from_utf8(set.read_vec(id)?)
            .map_err(|_| CorruptStoreError::InvalidName(self.store.range.start + id).into())
    }
}

/// Quality records must have the length of their residue records
fn check_parallel_lengths(sequences: &RollingSet, quality: &RollingSet) -> Result<()> {
    for id in 0..sequences.len() {
        if sequences.length(id) != quality.length(id) {
            return Err(CorruptStoreError::PointerTableInconsistent(format!(
                "quality length of record {id} differs from its sequence length"
            ))
            .into());
        }
    }
    Ok(())
}

impl SequencesReader for DiskReader {
    fn index(&self) -> &IndexMetadata {
        &self.store.index
    }

    fn range(&self) -> IdRange {
        self.store.range
    }

    fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    fn length(&self, id: u64) -> Result<u64> {
        let count = self.number_sequences();
        check_id(id, count)?;
        self.store
            .sequences
            .length(id)
            .ok_or(ReadError::OutOfRange { id, count }.into())
    }

    fn name(&self, id: u64) -> Result<String> {
        self.read_string(self.name_set()?, id)
    }

    fn name_suffix(&self, id: u64) -> Result<String> {
        match &self.store.suffixes {
            Some(set) => self.read_string(set, id),
            None => {
                check_id(id, self.number_sequences())?;
                Ok(String::new())
            }
        }
    }

    fn read_range(&self, id: u64, out: &mut [u8], start: u64, length: u64) -> Result<usize> {
        let sequence_length = self.length(id)?;
        check_request(start, length, sequence_length, out.len())?;
        let length = length as usize;
        self.store
            .sequences
            .read_into(id, start, &mut out[..length])?;
        Ok(length)
    }

    fn read_quality_range(
        &self,
        id: u64,
        out: &mut [u8],
        start: u64,
        length: u64,
    ) -> Result<usize> {
        let set = self.quality_set()?;
        let sequence_length = self.length(id)?;
        check_request(start, length, sequence_length, out.len())?;
        let length = length as usize;
        set.read_into(id, start, &mut out[..length])?;
        Ok(length)
    }

    fn data_checksum(&self, id: u64) -> Result<u8> {
        check_id(id, self.number_sequences())?;
        self.store
            .sequences
            .checksum(id)
            .ok_or(CorruptStoreError::UnexpectedEnd("sequence pointers").into())
    }

    fn quality_checksum(&self, id: u64) -> Result<u8> {
        let set = self.quality_set()?;
        check_id(id, self.number_sequences())?;
        set.checksum(id)
            .ok_or(CorruptStoreError::UnexpectedEnd("quality pointers").into())
    }

    fn name_checksum(&self, id: u64) -> Result<u8> {
        let set = self.name_set()?;
        check_id(id, self.number_sequences())?;
        set.checksum(id)
            .ok_or(CorruptStoreError::UnexpectedEnd("name pointers").into())
    }

    fn suffix_checksum(&self, id: u64) -> Result<u8> {
        check_id(id, self.number_sequences())?;
        match &self.store.suffixes {
            Some(set) => set
                .checksum(id)
                .ok_or(CorruptStoreError::UnexpectedEnd("suffix pointers").into()),
            None => Ok(record_checksum(&[])),
        }
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.store.dir)
    }

    fn copy(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cursor: Cursor::default(),
        }
    }

    fn length_between(&self, start: u64, end: u64) -> Result<u64> {
        check_span(start, end, self.number_sequences())?;
        self.store
            .sequences
            .length_between(start, end)
            .ok_or(CorruptStoreError::UnexpectedEnd("sequence pointers").into())
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::{alphabet::SequenceType, writer::SdfWriterBuilder};

    fn write_sample(dir: &Path) -> Result<()> {
        let mut writer = SdfWriterBuilder::default()
            .quality(true)
            .max_file_size(20)
            .build(dir)?;
        writer.write(Some("first read one"), &[1, 2, 3, 4, 1, 2], Some(&[10, 11, 12, 13, 14, 15]))?;
        writer.write(Some("second"), &[], Some(&[]))?;
        writer.write(Some("third"), &[4; 30], Some(&[20; 30]))?;
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn test_random_access() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_sample(dir.path())?;
        let reader = DiskReader::open(dir.path())?;

        assert_eq!(reader.number_sequences(), 3);
        assert_eq!(reader.sequence_type(), SequenceType::Dna);
        assert_eq!(reader.name(0)?, "first");
        assert_eq!(reader.name_suffix(0)?, " read one");
        assert_eq!(reader.full_name(0)?, "first read one");
        assert_eq!(reader.name_suffix(1)?, "");
        assert_eq!(reader.read_vec(0)?, vec![1, 2, 3, 4, 1, 2]);
        assert_eq!(reader.read_quality_vec(2)?, vec![20; 30]);
        assert_eq!(reader.length(1)?, 0);
        assert_eq!(reader.length_between(0, 3)?, 36);
        assert_eq!(reader.sequence_lengths(1, 3)?, vec![0, 30]);
        assert_eq!(reader.path(), Some(dir.path()));

        let mut out = [0u8; 3];
        assert_eq!(reader.read_range(2, &mut out, 27, 3)?, 3);
        assert!(reader.read(0, &mut out).unwrap_err().is_buffer_size());
        assert!(reader.length(3).unwrap_err().is_out_of_range());
        Ok(())
    }

    #[test]
    fn test_cursor() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_sample(dir.path())?;
        let mut reader = DiskReader::open(dir.path())?;

        assert!(reader.current_name().unwrap_err().is_no_current_record());
        let mut names = Vec::new();
        while reader.next_sequence() {
            names.push(reader.current_name()?);
        }
        assert_eq!(names, ["first", "second", "third"]);
        assert!(reader.current_length().is_err());

        reader.seek(2)?;
        assert!(reader.seek(3).is_err());
        assert_eq!(reader.current_length()?, 30);

        let copy = reader.copy();
        assert!(copy.current_id().is_err());
        assert_eq!(copy.read_vec(2)?, reader.read_vec(2)?);
        Ok(())
    }

    #[test]
    fn test_open_range() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_sample(dir.path())?;
        let reader = DiskReader::open_range(dir.path(), LoadRange::new(1, 10))?;
        assert!(reader.range().was_clamped());
        assert_eq!(reader.number_sequences(), 2);
        assert_eq!(reader.name(0)?, "second");
        assert_eq!(reader.read_vec(1)?, vec![4; 30]);

        assert!(DiskReader::open_range(dir.path(), LoadRange::new(4, 5)).is_err());
        assert!(DiskReader::open_range(dir.path(), LoadRange::new(2, 1)).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let err = DiskReader::open(dir.path()).err().unwrap();
        assert!(err.is_corrupt());
        assert!(DiskReader::open(dir.path().join("absent")).is_err());
    }
}
