use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use byteorder::{ByteOrder, LittleEndian};

use super::{FileKind, ROLLING_FORMAT};
use crate::{
    checksum::{append_seal, verify_seal},
    error::{CorruptStoreError, FormatError, Result},
};

/// Magic number to designate rolling indices ("SDFR" in ASCII)
#[allow(clippy::unreadable_literal)]
pub const ROLLING_MAGIC: u32 = 0x52464453;

/// Size of the rolling index header in bytes
pub const SIZE_ROLLING_HEADER: usize = 32;

/// Reserved bytes of the rolling index header
pub const ROLLING_RESERVED: [u8; 18] = [42; 18];

const SIZE_ENTRY: usize = 16;

/// Number of records starting in, and bytes held by, one data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RollingIndexEntry {
    pub records: u64,
    pub bytes: u64,
}

/// Per-file record and byte counts of one rolling file set
///
/// | bytes | field |
/// | --- | --- |
/// | 0..4 | magic |
/// | 4 | format |
/// | 5 | file kind |
/// | 6..14 | number of files |
/// | 14..32 | reserved |
///
/// The header is followed by 16 bytes per file and the trailing checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingIndex {
    kind: FileKind,
    entries: Vec<RollingIndexEntry>,
}
impl RollingIndex {
    #[must_use]
    pub fn new(kind: FileKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, records: u64, bytes: u64) {
        self.entries.push(RollingIndexEntry { records, bytes });
    }

    #[must_use]
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    #[must_use]
    pub fn entries(&self) -> &[RollingIndexEntry] {
        &self.entries
    }

    /// Number of data files
    #[must_use]
    pub fn num_files(&self) -> usize {
        self.entries.len()
    }

    /// Total number of records over all files
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.entries.iter().map(|e| e.records).sum()
    }

    /// Total number of bytes over all files
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.bytes).sum()
    }

    /// Number of records starting before each file, with a final total
    #[must_use]
    pub fn record_starts(&self) -> Vec<u64> {
        cumulative(self.entries.iter().map(|e| e.records))
    }

    /// Number of bytes stored before each file, with a final total
    #[must_use]
    pub fn byte_starts(&self) -> Vec<u64> {
        cumulative(self.entries.iter().map(|e| e.bytes))
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; SIZE_ROLLING_HEADER];
        LittleEndian::write_u32(&mut buf[0..4], ROLLING_MAGIC);
        buf[4] = ROLLING_FORMAT;
        buf[5] = self.kind.tag();
        LittleEndian::write_u64(&mut buf[6..14], self.entries.len() as u64);
        buf[14..].copy_from_slice(&ROLLING_RESERVED);
        for entry in &self.entries {
            buf.extend_from_slice(&entry.records.to_le_bytes());
            buf.extend_from_slice(&entry.bytes.to_le_bytes());
        }
        append_seal(&mut buf);
        buf
    }

    /// Parses a complete rolling index; `path` only labels errors
    pub fn from_bytes(buffer: &[u8], kind: FileKind, path: &Path) -> Result<Self> {
        let Some(header) = buffer.first_chunk::<SIZE_ROLLING_HEADER>() else {
            return Err(CorruptStoreError::UnexpectedEnd("rolling index header").into());
        };
        let magic = LittleEndian::read_u32(&header[0..4]);
        if magic != ROLLING_MAGIC {
            return Err(FormatError::InvalidMagicNumber(magic).into());
        }
        let content = verify_seal(buffer, path)?;
        let format = u32::from(header[4]);
        if format > u32::from(ROLLING_FORMAT) {
            return Err(FormatError::UnsupportedVersion {
                found: format,
                supported: u32::from(ROLLING_FORMAT),
            }
            .into());
        }
        if format == 0 {
            return Err(FormatError::InvalidVersion(format).into());
        }
        kind.expect_tag(header[5])?;
        if header[14..] != ROLLING_RESERVED {
            return Err(FormatError::InvalidReservedBytes.into());
        }
        let num_files = LittleEndian::read_u64(&header[6..14]);
        let body = &content[SIZE_ROLLING_HEADER..];
        if usize::try_from(num_files)
            .ok()
            .and_then(|n| n.checked_mul(SIZE_ENTRY))
            != Some(body.len())
        {
            return Err(CorruptStoreError::Decode {
                path: path.to_path_buf(),
                reason: format!("{} bytes of entries for {num_files} files", body.len()),
            }
            .into());
        }
        let entries = body
            .chunks_exact(SIZE_ENTRY)
            .map(|chunk| RollingIndexEntry {
                records: LittleEndian::read_u64(&chunk[0..8]),
                bytes: LittleEndian::read_u64(&chunk[8..16]),
            })
            .collect();
        Ok(Self { kind, entries })
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(self.kind.index_path(dir))?);
        writer.write_all(&self.to_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(dir: &Path, kind: FileKind) -> Result<Self> {
        let path = kind.index_path(dir);
        if !path.is_file() {
            return Err(CorruptStoreError::MissingFile(path).into());
        }
        let buffer = fs::read(&path)?;
        Self::from_bytes(&buffer, kind, &path)
    }
}

fn cumulative(values: impl Iterator<Item = u64>) -> Vec<u64> {
    let mut starts = vec![0];
    let mut total = 0u64;
    for v in values {
        total = total.saturating_add(v);
        starts.push(total);
    }
    starts
}
