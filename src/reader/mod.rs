//! Reading stores
//!
//! Every reader implements [`SequencesReader`]: random access by id through
//! `&self`, and a cursor (`next_sequence`, `seek`, `current_*`) through
//! `&mut self`. Ids are local to the loaded range: id 0 of a reader opened on
//! `[start, end)` is global record `start`.
//!
//! * [`DiskReader`] maps the data files and reads on demand
//! * [`MemoryReader`] loads the range into bit-packed buffers
//! * [`ReverseComplementReader`] wraps any DNA reader

mod disk;
mod memory;
mod reverse;

pub use disk::DiskReader;
pub use memory::{MemoryReader, MemoryReaderBuilder};
pub(crate) use memory::MemoryBuffers;
pub use reverse::ReverseComplementReader;

use std::{fs, path::Path};

use crate::{
    alphabet::SequenceType,
    error::{ReadError, Result},
    index::IndexMetadata,
};

/// Optional free-text description shipped alongside a store
pub const README_FILE: &str = "readme.txt";

/// Optional reference description shipped alongside a store
pub const REFERENCE_FILE: &str = "reference.txt";

/// Requested sub-range of a store, as given at open time
///
/// Either bound may be left open. An `end` beyond the number of sequences is
/// clamped with a warning; a `start` beyond it, or past `end`, is an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadRange {
    start: Option<u64>,
    end: Option<u64>,
}
impl LoadRange {
    /// The whole store
    #[must_use]
    pub fn full() -> Self {
        Self::default()
    }

    /// Records `[start, end)`
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Records from `start` to the end of the store
    #[must_use]
    pub fn from_start(start: u64) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Records from the beginning of the store up to `end`
    #[must_use]
    pub fn until(end: u64) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// Resolves the range against a store of `count` sequences
    pub fn resolve(&self, count: u64) -> Result<IdRange> {
        let start = self.start.unwrap_or(0);
        let requested_end = self.end.unwrap_or(count);
        if start > count || start > requested_end {
            return Err(ReadError::InvalidRange {
                start,
                end: requested_end,
                count,
            }
            .into());
        }
        let was_clamped = requested_end > count;
        if was_clamped {
            log::warn!(
                "The end sequence id \"{requested_end}\" is out of range, it must be from \"{start}\" to \"{count}\". Defaulting end to \"{count}\""
            );
        }
        Ok(IdRange {
            start,
            end: requested_end.min(count),
            was_clamped,
        })
    }
}

/// Resolved range of global ids `[start, end)` held by a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    pub start: u64,
    pub end: u64,
    was_clamped: bool,
}
impl IdRange {
    /// The whole of a store of `count` sequences
    #[must_use]
    pub fn full(count: u64) -> Self {
        Self {
            start: 0,
            end: count,
            was_clamped: false,
        }
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// True if the requested end was beyond the store and had to be clamped
    #[must_use]
    pub fn was_clamped(&self) -> bool {
        self.was_clamped
    }

    /// True if the range spans a whole store of `count` sequences
    #[must_use]
    pub fn covers(&self, count: u64) -> bool {
        self.start == 0 && self.end == count
    }
}

/// Cursor state shared by every reader
///
/// `UNPOSITIONED` until the first successful `next_sequence` or `seek`, and again
/// once `next_sequence` runs off the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    current: Option<u64>,
    next: u64,
}
impl Cursor {
    /// Moves to the next record, returning false (and unpositioning) at the end
    pub fn advance(&mut self, count: u64) -> bool {
        if self.next < count {
            self.current = Some(self.next);
            self.next += 1;
            true
        } else {
            self.current = None;
            false
        }
    }

    /// Positions on `id`; a failed seek leaves the cursor untouched
    pub fn seek(&mut self, id: u64, count: u64) -> Result<()> {
        check_id(id, count)?;
        self.current = Some(id);
        self.next = id + 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn current(&self) -> Result<u64> {
        self.current.ok_or(ReadError::NoCurrentRecord.into())
    }
}

/// Fails with [`ReadError::OutOfRange`] unless `id < count`
pub fn check_id(id: u64, count: u64) -> Result<()> {
    if id >= count {
        return Err(ReadError::OutOfRange { id, count }.into());
    }
    Ok(())
}

/// Validates a request for `length` values starting at `start` of a record of
/// `sequence_length` values into a buffer of `provided` slots
pub fn check_request(start: u64, length: u64, sequence_length: u64, provided: usize) -> Result<()> {
    if start
        .checked_add(length)
        .is_none_or(|end| end > sequence_length)
    {
        return Err(ReadError::SubsequenceOutOfRange {
            start,
            length,
            sequence_length,
        }
        .into());
    }
    if (provided as u64) < length {
        return Err(ReadError::BufferTooSmall {
            provided,
            required: length as usize,
        }
        .into());
    }
    Ok(())
}

/// Reads an optional sidecar text file of the store at `dir`
pub fn read_sidecar(dir: Option<&Path>, file: &str) -> Result<Option<String>> {
    let Some(dir) = dir else {
        return Ok(None);
    };
    let path = dir.join(file);
    if !path.is_file() {
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(path)?))
}

/// Read access to a store
///
/// Random access methods take `&self` and never move the cursor. Cursor methods
/// take `&mut self`; a single instance is not meant to be shared between
/// threads, use [`copy`](SequencesReader::copy) instead.
pub trait SequencesReader {
    /// Metadata of the whole store
    fn index(&self) -> &IndexMetadata;

    /// Global ids held by this reader
    fn range(&self) -> IdRange;

    fn cursor(&self) -> &Cursor;

    fn cursor_mut(&mut self) -> &mut Cursor;

    /// Length of record `id`
    fn length(&self, id: u64) -> Result<u64>;

    /// Name label of record `id`
    fn name(&self, id: u64) -> Result<String>;

    /// Name suffix of record `id` (empty if the store has no suffixes)
    fn name_suffix(&self, id: u64) -> Result<String>;

    /// Copies `length` residue codes of record `id`, starting at `start`, into `out`
    ///
    /// Returns the number of codes written.
    fn read_range(&self, id: u64, out: &mut [u8], start: u64, length: u64) -> Result<usize>;

    /// Copies `length` quality values of record `id`, starting at `start`, into `out`
    fn read_quality_range(&self, id: u64, out: &mut [u8], start: u64, length: u64)
        -> Result<usize>;

    /// Stored checksum of the residues of record `id`
    fn data_checksum(&self, id: u64) -> Result<u8>;

    /// Stored checksum of the quality values of record `id`
    fn quality_checksum(&self, id: u64) -> Result<u8>;

    /// Stored checksum of the name label of record `id`
    fn name_checksum(&self, id: u64) -> Result<u8>;

    /// Stored checksum of the name suffix of record `id`
    fn suffix_checksum(&self, id: u64) -> Result<u8>;

    /// Directory of the store, `None` for stores that only exist in memory
    fn path(&self) -> Option<&Path>;

    /// A reader over the same store with its own cursor, sharing immutable state
    #[must_use]
    fn copy(&self) -> Self
    where
        Self: Sized;

    /// The reader whose records are exactly the stored bytes
    ///
    /// Readers that transform records on the fly return the reader they wrap.
    /// Verification walks this reader, so stored checksums always meet the bytes
    /// they were computed over.
    fn stored_records(&self) -> &dyn SequencesReader
    where
        Self: Sized,
    {
        self
    }

    fn number_sequences(&self) -> u64 {
        self.range().len()
    }

    fn sequence_type(&self) -> SequenceType {
        self.index().sequence_type
    }

    fn has_quality(&self) -> bool {
        self.index().has_quality
    }

    fn has_names(&self) -> bool {
        self.index().has_names
    }

    /// Label and suffix joined back together
    fn full_name(&self, id: u64) -> Result<String> {
        let mut name = self.name(id)?;
        name.push_str(&self.name_suffix(id)?);
        Ok(name)
    }

    /// Copies every residue code of record `id` into `out`
    fn read(&self, id: u64, out: &mut [u8]) -> Result<usize> {
        let length = self.length(id)?;
        self.read_range(id, out, 0, length)
    }

    /// Copies every quality value of record `id` into `out`
    fn read_quality(&self, id: u64, out: &mut [u8]) -> Result<usize> {
        let length = self.length(id)?;
        self.read_quality_range(id, out, 0, length)
    }

    /// Residue codes of record `id` in a new buffer
    fn read_vec(&self, id: u64) -> Result<Vec<u8>> {
        let mut out = vec![0; self.length(id)? as usize];
        self.read(id, &mut out)?;
        Ok(out)
    }

    /// Quality values of record `id` in a new buffer
    fn read_quality_vec(&self, id: u64) -> Result<Vec<u8>> {
        let mut out = vec![0; self.length(id)? as usize];
        self.read_quality(id, &mut out)?;
        Ok(out)
    }

    /// Combined length of the records `[start, end)`
    fn length_between(&self, start: u64, end: u64) -> Result<u64> {
        check_span(start, end, self.number_sequences())?;
        (start..end).map(|id| self.length(id)).sum()
    }

    /// Lengths of the records `[start, end)`
    fn sequence_lengths(&self, start: u64, end: u64) -> Result<Vec<u64>> {
        check_span(start, end, self.number_sequences())?;
        (start..end).map(|id| self.length(id)).collect()
    }

    /// Residue counts of the whole store, indexed by code
    fn residue_counts(&self) -> &[u64] {
        &self.index().residue_counts
    }

    /// Number of sequences by count of unknown residues
    fn histogram(&self) -> &[u64] {
        &self.index().n_histogram
    }

    /// Unknown residues by position
    fn pos_histogram(&self) -> &[u64] {
        &self.index().pos_histogram
    }

    /// Identity token of the store
    fn store_id(&self) -> u64 {
        self.index().store_id
    }

    /// Contents of the store's `readme.txt`, if any
    fn read_me(&self) -> Result<Option<String>> {
        read_sidecar(self.path(), README_FILE)
    }

    /// Contents of the store's `reference.txt`, if any
    fn reference_text(&self) -> Result<Option<String>> {
        read_sidecar(self.path(), REFERENCE_FILE)
    }

    /// Moves the cursor to the next record
    fn next_sequence(&mut self) -> bool {
        let count = self.number_sequences();
        self.cursor_mut().advance(count)
    }

    /// Moves the cursor to record `id`
    fn seek(&mut self, id: u64) -> Result<()> {
        let count = self.number_sequences();
        self.cursor_mut().seek(id, count)
    }

    /// Returns the cursor to its initial unpositioned state
    fn reset(&mut self) {
        self.cursor_mut().reset();
    }

    fn current_id(&self) -> Result<u64> {
        self.cursor().current()
    }

    fn current_name(&self) -> Result<String> {
        self.name(self.current_id()?)
    }

    fn current_full_name(&self) -> Result<String> {
        self.full_name(self.current_id()?)
    }

    fn current_length(&self) -> Result<u64> {
        self.length(self.current_id()?)
    }

    fn read_current(&self, out: &mut [u8]) -> Result<usize> {
        self.read(self.current_id()?, out)
    }

    fn read_current_quality(&self, out: &mut [u8]) -> Result<usize> {
        self.read_quality(self.current_id()?, out)
    }
}

/// Validates a span `[start, end)` of local ids
fn check_span(start: u64, end: u64, count: u64) -> Result<()> {
    if start > end || end > count {
        return Err(ReadError::InvalidRange { start, end, count }.into());
    }
    Ok(())
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_range_resolution() -> Result<()> {
        let range = LoadRange::full().resolve(10)?;
        assert_eq!((range.start, range.end), (0, 10));
        assert!(range.covers(10));

        let range = LoadRange::new(2, 50).resolve(10)?;
        assert_eq!((range.start, range.end, range.len()), (2, 10, 8));
        assert!(range.was_clamped());

        let range = LoadRange::from_start(10).resolve(10)?;
        assert!(range.is_empty());

        assert!(LoadRange::from_start(11).resolve(10).is_err());
        assert!(LoadRange::new(5, 3).resolve(10).is_err());
        assert_eq!(LoadRange::until(4).resolve(10)?.len(), 4);
        Ok(())
    }

    #[test]
    fn test_cursor_states() -> Result<()> {
        let mut cursor = Cursor::default();
        assert!(cursor.current().unwrap_err().is_no_current_record());
        assert!(cursor.advance(2));
        assert_eq!(cursor.current()?, 0);
        assert!(cursor.advance(2));
        assert!(!cursor.advance(2));
        assert!(cursor.current().is_err());

        cursor.seek(1, 2)?;
        assert!(cursor.seek(2, 2).unwrap_err().is_out_of_range());
        assert_eq!(cursor.current()?, 1);
        assert!(!cursor.advance(2));

        cursor.reset();
        assert!(cursor.advance(2));
        assert_eq!(cursor.current()?, 0);
        Ok(())
    }

    #[test]
    fn test_request_checks() {
        assert!(check_request(0, 4, 4, 4).is_ok());
        assert!(check_request(0, 0, 0, 0).is_ok());
        let err = check_request(0, 4, 4, 2).unwrap_err();
        assert!(err.is_buffer_size());
        assert!(check_request(2, 3, 4, 10).is_err());
        assert!(check_request(u64::MAX, 2, 4, 10).is_err());
    }
}
