use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use super::{FileKind, PointerTable, RollingIndex};
use crate::error::Result;

/// Writes the records of one kind into size-capped data files
///
/// Bytes fill the current file up to the cap and continue at offset 0 of the
/// next file. A new file is only opened when there is a byte to write and the
/// current file is full, so a record's pointer always lives in the file holding
/// its first byte (or its offset, for zero-length records).
pub struct RollingWriter {
    dir: PathBuf,
    kind: FileKind,
    max_file_size: u64,

    /// Number of the current data file
    file_no: usize,

    /// Buffered writer of the current data file
    inner: BufWriter<File>,

    /// Bytes written to the current data file
    current_size: u64,

    /// Pointer table of the current data file
    table: PointerTable,

    /// Counts of every completed file
    index: RollingIndex,
}
impl RollingWriter {
    /// Creates the first data file of `kind` in `dir`
    pub fn new(dir: &Path, kind: FileKind, max_file_size: u64) -> Result<Self> {
        let inner = BufWriter::new(File::create(kind.data_path(dir, 0))?);
        Ok(Self {
            dir: dir.to_path_buf(),
            kind,
            max_file_size,
            file_no: 0,
            inner,
            current_size: 0,
            table: PointerTable::new(kind),
            index: RollingIndex::new(kind),
        })
    }

    #[must_use]
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Number of data files opened so far
    #[must_use]
    pub fn num_files(&self) -> usize {
        self.file_no + 1
    }

    /// Appends one record
    pub fn write_record(&mut self, bytes: &[u8], checksum: u8) -> Result<()> {
        if !bytes.is_empty() && self.current_size == self.max_file_size {
            self.roll()?;
        }
        self.table
            .push(self.current_size, bytes.len() as u64, checksum);

        let mut rest = bytes;
        while !rest.is_empty() {
            if self.current_size == self.max_file_size {
                self.roll()?;
            }
            let room = (self.max_file_size - self.current_size).min(rest.len() as u64) as usize;
            self.inner.write_all(&rest[..room])?;
            self.current_size += room as u64;
            rest = &rest[room..];
        }
        Ok(())
    }

    /// Appends `count` zero-length records
    pub fn write_empty(&mut self, count: u64) {
        for _ in 0..count {
            self.table.push(self.current_size, 0, 0);
        }
    }

    /// Closes the current data file and writes its pointer table
    fn close_current(&mut self) -> Result<()> {
        self.inner.flush()?;
        self.table.set_data_size(self.current_size);
        self.table
            .save(&self.kind.pointer_path(&self.dir, self.file_no))?;
        self.index
            .push(self.table.len() as u64, self.current_size);
        log::debug!(
            "Closed {} with {} records and {} bytes",
            self.kind.data_path(&self.dir, self.file_no).display(),
            self.table.len(),
            self.current_size
        );
        Ok(())
    }

    fn roll(&mut self) -> Result<()> {
        self.close_current()?;
        self.file_no += 1;
        self.inner = BufWriter::new(File::create(self.kind.data_path(&self.dir, self.file_no))?);
        self.current_size = 0;
        self.table = PointerTable::new(self.kind);
        Ok(())
    }

    /// Closes the last file and writes the rolling index
    pub fn finish(mut self) -> Result<RollingIndex> {
        self.close_current()?;
        self.index.save(&self.dir)?;
        Ok(self.index)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::rolling::RollingSet;

    #[test]
    fn test_records_span_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut writer = RollingWriter::new(dir.path(), FileKind::Sequence, 20)?;
        writer.write_record(&[1; 15], 1)?;
        writer.write_record(&[2; 10], 2)?;
        writer.write_record(&[], 0)?;
        writer.write_record(&[3; 45], 3)?;
        let index = writer.finish()?;

        assert_eq!(index.num_files(), 4);
        assert_eq!(index.total_bytes(), 70);
        assert_eq!(index.total_records(), 4);
        // The second record starts in file 0, the empty record sits at offset 5 of
        // file 1 and the last record starts right after it
        assert_eq!(index.entries()[0].records, 2);
        assert_eq!(index.entries()[1].records, 2);
        assert_eq!(index.entries()[2].records, 0);
        for n in 0..4 {
            assert!(std::fs::metadata(FileKind::Sequence.data_path(dir.path(), n))?.len() <= 20);
        }

        let set = RollingSet::open(dir.path(), FileKind::Sequence, 0, 4, 4)?;
        assert_eq!(set.read_vec(1)?, vec![2; 10]);
        assert_eq!(set.length(2), Some(0));
        assert_eq!(set.read_vec(3)?, vec![3; 45]);
        Ok(())
    }

    #[test]
    fn test_no_roll_for_empty_record_at_cap() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut writer = RollingWriter::new(dir.path(), FileKind::Name, 20)?;
        writer.write_record(&[b'a'; 20], 0)?;
        writer.write_record(&[], 0)?;
        let index = writer.finish()?;
        assert_eq!(index.num_files(), 1);
        assert_eq!(index.entries()[0].records, 2);
        Ok(())
    }
}
