//! Pointer tables
//!
//! A pointer table maps every record that starts in one data file to its byte
//! offset within that file, its length and its one-byte checksum. The table is
//! stored as a fixed 32-byte header, a zstd-compressed payload of entries in one
//! of two layouts, and a trailing FNV-1a checksum over all preceding bytes.

use std::{
    fs::{self, File},
    io::{BufWriter, Read, Write},
    path::Path,
};

use byteorder::{ByteOrder, LittleEndian};
use zstd::{Decoder, Encoder};

use super::{FileKind, ROLLING_FORMAT};
use crate::{
    checksum::{append_seal, verify_seal},
    error::{CorruptStoreError, FormatError, Result},
};

/// Magic number to designate pointer files ("SDFP" in ASCII)
#[allow(clippy::unreadable_literal)]
pub const POINTER_MAGIC: u32 = 0x50464453;

/// Size of the pointer file header in bytes
pub const SIZE_POINTER_HEADER: usize = 32;

/// Reserved bytes of the pointer file header
pub const POINTER_RESERVED: [u8; 9] = [42; 9];

/// Compression level of the pointer payload
const COMPRESSION_LEVEL: i32 = 3;

/// Encoding of the entries of a pointer table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerLayout {
    /// 32-bit offsets and lengths, for files that fit in 4 GiB
    Small,
    /// 64-bit offsets and lengths
    Large,
}
impl PointerLayout {
    /// Size of one serialized entry
    #[must_use]
    pub const fn entry_size(self) -> usize {
        match self {
            Self::Small => 4 + 4 + 1,
            Self::Large => 8 + 8 + 1,
        }
    }

    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Small => 0,
            Self::Large => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Small),
            1 => Ok(Self::Large),
            x => Err(FormatError::InvalidPointerLayout(x).into()),
        }
    }

    /// Smallest layout that represents every offset of a file of `data_size` bytes
    ///
    /// Record lengths never exceed `u32::MAX`, so only offsets decide.
    #[must_use]
    pub fn for_data_size(data_size: u64) -> Self {
        if data_size <= u64::from(u32::MAX) {
            Self::Small
        } else {
            Self::Large
        }
    }
}

/// Fixed header of a pointer file
///
/// | bytes | field |
/// | --- | --- |
/// | 0..4 | magic |
/// | 4 | format |
/// | 5 | file kind |
/// | 6 | layout |
/// | 7..15 | number of entries |
/// | 15..23 | size of the data file in bytes |
/// | 23..32 | reserved |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerHeader {
    pub kind: FileKind,
    pub layout: PointerLayout,
    pub count: u64,
    pub data_size: u64,
}
impl PointerHeader {
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buf = [0u8; SIZE_POINTER_HEADER];
        LittleEndian::write_u32(&mut buf[0..4], POINTER_MAGIC);
        buf[4] = ROLLING_FORMAT;
        buf[5] = self.kind.tag();
        buf[6] = self.layout.tag();
        LittleEndian::write_u64(&mut buf[7..15], self.count);
        LittleEndian::write_u64(&mut buf[15..23], self.data_size);
        buf[23..].copy_from_slice(&POINTER_RESERVED);
        writer.write_all(&buf)?;
        Ok(())
    }

    /// Parses a header, validating every fixed field
    pub fn from_bytes(buffer: &[u8; SIZE_POINTER_HEADER], kind: FileKind) -> Result<Self> {
        let magic = LittleEndian::read_u32(&buffer[0..4]);
        if magic != POINTER_MAGIC {
            return Err(FormatError::InvalidMagicNumber(magic).into());
        }
        let format = u32::from(buffer[4]);
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
        kind.expect_tag(buffer[5])?;
        let layout = PointerLayout::from_tag(buffer[6])?;
        if buffer[23..] != POINTER_RESERVED {
            return Err(FormatError::InvalidReservedBytes.into());
        }
        Ok(Self {
            kind,
            layout,
            count: LittleEndian::read_u64(&buffer[7..15]),
            data_size: LittleEndian::read_u64(&buffer[15..23]),
        })
    }
}

/// Location of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEntry {
    /// Byte offset of the record within its starting file
    pub offset: u64,
    /// Total length of the record, possibly continuing into later files
    pub length: u64,
    pub checksum: u8,
}

/// Pointer table of a single data file, stored as parallel flat arrays
#[derive(Debug, Clone)]
pub struct PointerTable {
    kind: FileKind,
    offsets: Vec<u64>,
    lengths: Vec<u64>,
    checksums: Vec<u8>,
    data_size: u64,
}
impl PointerTable {
    #[must_use]
    pub fn new(kind: FileKind) -> Self {
        Self {
            kind,
            offsets: Vec::new(),
            lengths: Vec::new(),
            checksums: Vec::new(),
            data_size: 0,
        }
    }

    #[must_use]
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn push(&mut self, offset: u64, length: u64, checksum: u8) {
        self.offsets.push(offset);
        self.lengths.push(length);
        self.checksums.push(checksum);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Size of the data file this table describes
    #[must_use]
    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    pub fn set_data_size(&mut self, data_size: u64) {
        self.data_size = data_size;
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<PointerEntry> {
        Some(PointerEntry {
            offset: *self.offsets.get(index)?,
            length: *self.lengths.get(index)?,
            checksum: *self.checksums.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = PointerEntry> + '_ {
        self.offsets
            .iter()
            .zip(&self.lengths)
            .zip(&self.checksums)
            .map(|((&offset, &length), &checksum)| PointerEntry {
                offset,
                length,
                checksum,
            })
    }

    fn header(&self) -> PointerHeader {
        PointerHeader {
            kind: self.kind,
            layout: PointerLayout::for_data_size(self.data_size),
            count: self.len() as u64,
            data_size: self.data_size,
        }
    }

    /// Serializes the header, the compressed entries and the trailing checksum
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header = self.header();
        let mut buf = Vec::with_capacity(SIZE_POINTER_HEADER + self.len() * 4);
        header.write_bytes(&mut buf)?;

        let mut payload = Vec::with_capacity(self.len() * header.layout.entry_size());
        for entry in self.iter() {
            match header.layout {
                PointerLayout::Small => {
                    payload.extend_from_slice(&(entry.offset as u32).to_le_bytes());
                    payload.extend_from_slice(&(entry.length as u32).to_le_bytes());
                }
                PointerLayout::Large => {
                    payload.extend_from_slice(&entry.offset.to_le_bytes());
                    payload.extend_from_slice(&entry.length.to_le_bytes());
                }
            }
            payload.push(entry.checksum);
        }

        let mut encoder = Encoder::new(&mut buf, COMPRESSION_LEVEL)?;
        encoder.include_checksum(true)?;
        encoder.write_all(&payload)?;
        encoder.finish()?;

        append_seal(&mut buf);
        Ok(buf)
    }

    /// Writes the table to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&self.to_bytes()?)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads and validates the table at `path`
    pub fn load(path: &Path, kind: FileKind) -> Result<Self> {
        if !path.is_file() {
            return Err(CorruptStoreError::MissingFile(path.to_path_buf()).into());
        }
        let buffer = fs::read(path)?;
        Self::from_bytes(&buffer, kind, path)
    }

    /// Parses and validates a complete pointer file
    ///
    /// `path` only labels errors.
    pub fn from_bytes(buffer: &[u8], kind: FileKind, path: &Path) -> Result<Self> {
        let decode_error = |reason: String| CorruptStoreError::Decode {
            path: path.to_path_buf(),
            reason,
        };

        let Some(header_bytes) = buffer.first_chunk::<SIZE_POINTER_HEADER>() else {
            return Err(CorruptStoreError::UnexpectedEnd("pointer header").into());
        };
        let magic = LittleEndian::read_u32(&header_bytes[0..4]);
        if magic != POINTER_MAGIC {
            return Err(FormatError::InvalidMagicNumber(magic).into());
        }
        let content = verify_seal(buffer, path)?;
        let header = PointerHeader::from_bytes(header_bytes, kind)?;

        let mut payload = Vec::new();
        Decoder::new(&content[SIZE_POINTER_HEADER..])
            .and_then(|mut decoder| decoder.read_to_end(&mut payload))
            .map_err(|e| decode_error(e.to_string()))?;

        let entry_size = header.layout.entry_size();
        let expected = usize::try_from(header.count)
            .ok()
            .and_then(|count| count.checked_mul(entry_size));
        if expected != Some(payload.len()) {
            return Err(decode_error(format!(
                "payload holds {} bytes for {} entries",
                payload.len(),
                header.count
            ))
            .into());
        }

        let mut table = Self::new(kind);
        table.data_size = header.data_size;
        for chunk in payload.chunks_exact(entry_size) {
            match header.layout {
                PointerLayout::Small => table.push(
                    u64::from(LittleEndian::read_u32(&chunk[0..4])),
                    u64::from(LittleEndian::read_u32(&chunk[4..8])),
                    chunk[8],
                ),
                PointerLayout::Large => table.push(
                    LittleEndian::read_u64(&chunk[0..8]),
                    LittleEndian::read_u64(&chunk[8..16]),
                    chunk[16],
                ),
            }
        }
        table.validate()?;
        Ok(table)
    }

    /// Checks that the entries tile the file
    ///
    /// Every entry starts within the file and the next entry starts where it
    /// ends. Only the last entry may run past the end of the file.
    fn validate(&self) -> Result<()> {
        let inconsistent = |msg: String| -> crate::Error {
            CorruptStoreError::PointerTableInconsistent(format!("{}: {msg}", self.kind.prefix()))
                .into()
        };
        let entries: Vec<PointerEntry> = self.iter().collect();
        for (i, entry) in entries.iter().enumerate() {
            if entry.offset > self.data_size {
                return Err(inconsistent(format!(
                    "entry {i} starts at {} beyond the file size {}",
                    entry.offset, self.data_size
                )));
            }
            let end = entry
                .offset
                .checked_add(entry.length)
                .ok_or_else(|| inconsistent(format!("entry {i} overflows")))?;
            if let Some(next) = entries.get(i + 1) {
                if next.offset != end {
                    return Err(inconsistent(format!(
                        "entry {} starts at {} but entry {i} ends at {end}",
                        i + 1,
                        next.offset
                    )));
                }
            }
        }
        Ok(())
    }
}
