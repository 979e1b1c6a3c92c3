use std::{fs::File, path::Path};

use memmap2::Mmap;

use super::{FileKind, PointerTable, RollingIndex};
use crate::error::{CorruptStoreError, ReadError, Result};

/// One mapped data file
enum Segment {
    Mapped(Mmap),
    /// Zero-byte files cannot be mapped on every platform
    Empty,
}
impl Segment {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Empty => &[],
        }
    }
}

/// Read-only view of the records `[start, end)` of one rolling file set
///
/// Opening validates the pointer tables of every file holding a record of the
/// range against the rolling index, checks that the records tile the files
/// without gaps, and maps every data file the range touches after checking its
/// size. Record `i` of the view is global record `start + i`.
pub struct RollingSet {
    kind: FileKind,

    /// Data files touched by the range, in order
    segments: Vec<Segment>,

    /// Offset of every segment relative to the first, with a final total
    segment_starts: Vec<u64>,

    /// Offset of every record relative to the first segment, with a final end
    positions: Vec<u64>,

    checksums: Vec<u8>,
}
impl RollingSet {
    /// Opens the records `[start, end)` of `kind` in `dir`
    ///
    /// `total_records` is the number of records of the whole store, which the
    /// rolling index must agree with.
    pub fn open(
        dir: &Path,
        kind: FileKind,
        start: u64,
        end: u64,
        total_records: u64,
    ) -> Result<Self> {
        let inconsistent = |msg: String| -> crate::Error {
            CorruptStoreError::PointerTableInconsistent(format!("{}: {msg}", kind.prefix())).into()
        };

        let index = RollingIndex::load(dir, kind)?;
        if index.num_files() == 0 {
            return Err(inconsistent("no data files".to_string()));
        }
        if index.total_records() != total_records {
            return Err(inconsistent(format!(
                "{} records indexed but the store holds {total_records}",
                index.total_records()
            )));
        }
        if start >= end {
            return Ok(Self {
                kind,
                segments: Vec::new(),
                segment_starts: vec![0],
                positions: vec![0],
                checksums: Vec::new(),
            });
        }
        if end > total_records {
            return Err(ReadError::InvalidRange {
                start,
                end,
                count: total_records,
            }
            .into());
        }

        let record_starts = index.record_starts();
        let byte_starts = index.byte_starts();
        let file_of = |id: u64| record_starts.partition_point(|&s| s <= id) - 1;
        let first_file = file_of(start);
        let last_table_file = file_of(end - 1);
        let base = byte_starts[first_file];

        // Gather the entries of every table touched by the range
        let mut positions = Vec::with_capacity((end - start + 1) as usize);
        let mut checksums = Vec::with_capacity((end - start) as usize);
        let mut previous_end: Option<u64> = None;
        let mut range_end = 0;
        for (f, entry) in index
            .entries()
            .iter()
            .enumerate()
            .take(last_table_file + 1)
            .skip(first_file)
        {
            let table = PointerTable::load(&kind.pointer_path(dir, f), kind)?;
            if table.len() as u64 != entry.records || table.data_size() != entry.bytes {
                return Err(inconsistent(format!(
                    "pointer file {f} holds {} records of {} bytes, index expects {} records of {} bytes",
                    table.len(),
                    table.data_size(),
                    entry.records,
                    entry.bytes
                )));
            }
            for (i, pointer) in table.iter().enumerate() {
                let id = record_starts[f] + i as u64;
                let position = byte_starts[f] - base + pointer.offset;
                if let Some(previous_end) = previous_end {
                    if position != previous_end {
                        return Err(inconsistent(format!(
                            "record {id} starts at {position} but the previous record ends at {previous_end}"
                        )));
                    }
                }
                previous_end = Some(position + pointer.length);
                if (start..end).contains(&id) {
                    positions.push(position);
                    checksums.push(pointer.checksum);
                    range_end = position + pointer.length;
                }
            }
        }
        positions.push(range_end);

        // Find the last file holding bytes of the range
        let available = |f: usize| byte_starts[f + 1] - base;
        let Some(last_file) = (last_table_file..index.num_files()).find(|&f| available(f) >= range_end)
        else {
            return Err(inconsistent(format!(
                "records extend to byte {range_end} beyond the last data file"
            )));
        };
        if end == total_records && range_end != available(index.num_files() - 1) {
            return Err(inconsistent(format!(
                "records end at byte {range_end} but the files hold {}",
                available(index.num_files() - 1)
            )));
        }

        let mut segments = Vec::with_capacity(last_file + 1 - first_file);
        for (f, entry) in index
            .entries()
            .iter()
            .enumerate()
            .take(last_file + 1)
            .skip(first_file)
        {
            segments.push(map_data_file(&kind.data_path(dir, f), entry.bytes)?);
        }
        let segment_starts = byte_starts[first_file..=last_file + 1]
            .iter()
            .map(|&s| s - base)
            .collect();

        Ok(Self {
            kind,
            segments,
            segment_starts,
            positions,
            checksums,
        })
    }

    #[must_use]
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Number of records in the view
    #[must_use]
    pub fn len(&self) -> u64 {
        self.checksums.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checksums.is_empty()
    }

    #[must_use]
    pub fn length(&self, id: u64) -> Option<u64> {
        let i = usize::try_from(id).ok()?;
        let next = i.checked_add(1)?;
        Some(self.positions.get(next)? - self.positions.get(i)?)
    }

    /// Combined length of the records `[a, b)`
    #[must_use]
    pub fn length_between(&self, a: u64, b: u64) -> Option<u64> {
        let a = usize::try_from(a).ok()?;
        let b = usize::try_from(b).ok()?;
        if a > b || b >= self.positions.len() {
            return None;
        }
        Some(self.positions[b] - self.positions[a])
    }

    #[must_use]
    pub fn checksum(&self, id: u64) -> Option<u8> {
        self.checksums.get(usize::try_from(id).ok()?).copied()
    }

    /// Copies `out.len()` bytes of record `id`, starting `offset` bytes into it
    pub fn read_into(&self, id: u64, offset: u64, out: &mut [u8]) -> Result<()> {
        let length = self.length(id).ok_or(ReadError::OutOfRange {
            id,
            count: self.len(),
        })?;
        if offset
            .checked_add(out.len() as u64)
            .is_none_or(|end| end > length)
        {
            return Err(ReadError::SubsequenceOutOfRange {
                start: offset,
                length: out.len() as u64,
                sequence_length: length,
            }
            .into());
        }
        let mut position = self.positions[id as usize] + offset;
        let mut segment = self.segment_starts.partition_point(|&s| s <= position) - 1;
        let mut written = 0;
        while written < out.len() {
            let data = self
                .segments
                .get(segment)
                .ok_or(CorruptStoreError::UnexpectedEnd("data file"))?
                .as_slice();
            let local = (position - self.segment_starts[segment]) as usize;
            let take = data.len().saturating_sub(local).min(out.len() - written);
            out[written..written + take].copy_from_slice(&data[local..local + take]);
            written += take;
            position += take as u64;
            segment += 1;
        }
        Ok(())
    }

    /// Returns a copy of record `id`
    pub fn read_vec(&self, id: u64) -> Result<Vec<u8>> {
        let length = self.length(id).ok_or(ReadError::OutOfRange {
            id,
            count: self.len(),
        })?;
        let mut out = vec![0; length as usize];
        self.read_into(id, 0, &mut out)?;
        Ok(out)
    }
}

/// Maps a data file after checking that it holds exactly `expected` bytes
fn map_data_file(path: &Path, expected: u64) -> Result<Segment> {
    if !path.is_file() {
        return Err(CorruptStoreError::MissingFile(path.to_path_buf()).into());
    }
    let file = File::open(path)?;
    let actual = file.metadata()?.len();
    if actual != expected {
        return Err(CorruptStoreError::Truncated {
            path: path.to_path_buf(),
            expected,
            actual,
        }
        .into());
    }
    if actual == 0 {
        return Ok(Segment::Empty);
    }

    // Safety: store files are immutable once written and are not modified while mapped
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(Segment::Mapped(mmap))
}
