//! Store index file
//!
//! Every store carries exactly one index file ([`INDEX_FILE`]) holding the
//! [`IndexMetadata`]: alphabet, size limit, length statistics, histograms,
//! checksums and provenance strings.
//!
//! # Layout
//!
//! All integers are little-endian.
//!
//! | bytes | field |
//! | --- | --- |
//! | 0..4 | magic (`SDFI`) |
//! | 4..8 | format version |
//! | 8 | sequence type tag |
//! | 9 | flags (quality, names, suffixes) |
//! | 10..16 | reserved |
//! | 16..24 | maximum file size |
//! | 24..32 | number of sequences |
//!
//! The 32-byte header is followed by the body (lengths, counting arrays, quality
//! averages, unknown-block statistics, checksums, store id, provenance strings)
//! and a trailing FNV-1a checksum over every preceding byte.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    alphabet::{SequenceType, MAX_CODES},
    checksum::{append_seal, verify_seal},
    error::{CorruptStoreError, FormatError, Result},
};

/// Name of the index file within a store directory
pub const INDEX_FILE: &str = "mainIndex";

/// Magic number: "SDFI" in ASCII (in little-endian byte order)
#[allow(clippy::unreadable_literal)]
pub const INDEX_MAGIC: u32 = 0x49464453;

/// Current format version of the index file
pub const FORMAT_VERSION: u32 = 1;

/// Size of the fixed index header in bytes
pub const SIZE_INDEX_HEADER: usize = 32;

/// Reserved bytes in the index header
pub const INDEX_RESERVED: [u8; 6] = [42; 6];

/// Number of buckets of every histogram
pub const MAX_HISTOGRAM: usize = 1000;

/// Default cap on the size of each rolling file: 2 GiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Smallest allowed cap on the size of each rolling file
pub const MIN_FILE_SIZE: u64 = 20;

/// Largest allowed cap on the size of each rolling file: 1 TiB
pub const MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024 * 1024;

/// Largest stored quality value; higher values are clipped by the writer
pub const MAX_QUALITY: u8 = 63;

/// Width of a packed quality value
pub const QUALITY_BITS: u8 = 6;

const FLAG_QUALITY: u8 = 1;
const FLAG_NAMES: u8 = 1 << 1;
const FLAG_SUFFIXES: u8 = 1 << 2;

/// Marks an absent provenance string
const NO_STRING: u32 = u32::MAX;

/// Persisted description of a complete store
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMetadata {
    /// Format version the store was written with
    pub version: u32,

    /// Cap on the size of each rolling file in bytes
    pub max_file_size: u64,

    pub sequence_type: SequenceType,
    pub has_quality: bool,
    pub has_names: bool,

    /// True if at least one record carries a non-empty name suffix
    pub has_suffixes: bool,

    /// Sum of all sequence lengths
    pub total_length: u64,
    pub max_length: u64,
    pub min_length: u64,
    pub number_sequences: u64,

    /// Occurrences of every residue code; entries past the alphabet are zero
    pub residue_counts: [u64; MAX_CODES],

    /// Number of sequences by count of unknown residues (last bucket saturates)
    pub n_histogram: Vec<u64>,

    /// Unknown residues by position within the sequence (last bucket saturates)
    pub pos_histogram: Vec<u64>,

    /// Average quality value at each of the first [`MAX_HISTOGRAM`] positions
    pub qs_position_averages: Vec<f64>,

    /// Average of every stored quality value
    pub global_qs_average: f64,

    /// Number of maximal runs of unknown residues
    pub n_blocks: u64,

    /// Length of the longest run of unknown residues
    pub longest_n_block: u64,

    pub data_checksum: u64,
    pub quality_checksum: u64,
    pub name_checksum: u64,
    pub suffix_checksum: u64,

    /// Random identity token of the store
    pub store_id: u64,

    pub comment: Option<String>,
    pub command_line: Option<String>,
    pub read_group: Option<String>,
}
impl IndexMetadata {
    /// Creates metadata for an empty store
    #[must_use]
    pub fn new(sequence_type: SequenceType, max_file_size: u64) -> Self {
        Self {
            version: FORMAT_VERSION,
            max_file_size,
            sequence_type,
            has_quality: false,
            has_names: false,
            has_suffixes: false,
            total_length: 0,
            max_length: 0,
            min_length: 0,
            number_sequences: 0,
            residue_counts: [0; MAX_CODES],
            n_histogram: vec![0; MAX_HISTOGRAM],
            pos_histogram: vec![0; MAX_HISTOGRAM],
            qs_position_averages: vec![0.0; MAX_HISTOGRAM],
            global_qs_average: 0.0,
            n_blocks: 0,
            longest_n_block: 0,
            data_checksum: 0,
            quality_checksum: 0,
            name_checksum: 0,
            suffix_checksum: 0,
            store_id: 0,
            comment: None,
            command_line: None,
            read_group: None,
        }
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.has_quality {
            flags |= FLAG_QUALITY;
        }
        if self.has_names {
            flags |= FLAG_NAMES;
        }
        if self.has_suffixes {
            flags |= FLAG_SUFFIXES;
        }
        flags
    }

    /// Serializes the metadata, including the trailing checksum
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; SIZE_INDEX_HEADER];
        LittleEndian::write_u32(&mut buf[0..4], INDEX_MAGIC);
        LittleEndian::write_u32(&mut buf[4..8], self.version);
        buf[8] = self.sequence_type.tag();
        buf[9] = self.flags();
        buf[10..16].copy_from_slice(&INDEX_RESERVED);
        LittleEndian::write_u64(&mut buf[16..24], self.max_file_size);
        LittleEndian::write_u64(&mut buf[24..32], self.number_sequences);

        let mut body = FieldWriter(buf);
        body.u64(self.total_length);
        body.u64(self.max_length);
        body.u64(self.min_length);
        self.residue_counts.iter().for_each(|&x| body.u64(x));
        self.n_histogram.iter().for_each(|&x| body.u64(x));
        self.pos_histogram.iter().for_each(|&x| body.u64(x));
        self.qs_position_averages
            .iter()
            .for_each(|&x| body.u64(x.to_bits()));
        body.u64(self.global_qs_average.to_bits());
        body.u64(self.n_blocks);
        body.u64(self.longest_n_block);
        body.u64(self.data_checksum);
        body.u64(self.quality_checksum);
        body.u64(self.name_checksum);
        body.u64(self.suffix_checksum);
        body.u64(self.store_id);
        body.string(self.comment.as_deref());
        body.string(self.command_line.as_deref());
        body.string(self.read_group.as_deref());

        let mut buf = body.0;
        append_seal(&mut buf);
        buf
    }

    /// Parses metadata from the complete contents of an index file
    ///
    /// # Errors
    ///
    /// * [`FormatError::UnsupportedVersion`] if the version is newer than [`FORMAT_VERSION`]
    /// * [`FormatError`] or [`CorruptStoreError`] for any structural problem
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < 8 {
            return Err(CorruptStoreError::UnexpectedEnd("index header").into());
        }
        let magic = LittleEndian::read_u32(&buffer[0..4]);
        if magic != INDEX_MAGIC {
            return Err(FormatError::InvalidMagicNumber(magic).into());
        }

        // Validate the seal before trusting any field
        let content = verify_seal(buffer, Path::new(INDEX_FILE))?;
        if content.len() < SIZE_INDEX_HEADER {
            return Err(CorruptStoreError::UnexpectedEnd("index header").into());
        }

        let version = LittleEndian::read_u32(&content[4..8]);
        if version > FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            }
            .into());
        }
        if version == 0 {
            return Err(FormatError::InvalidVersion(version).into());
        }

        if content[10..16] != INDEX_RESERVED {
            return Err(FormatError::InvalidReservedBytes.into());
        }
        let sequence_type = SequenceType::from_tag(content[8])?;
        let flags = content[9];
        let max_file_size = LittleEndian::read_u64(&content[16..24]);
        let number_sequences = LittleEndian::read_u64(&content[24..32]);

        let mut body = FieldReader::new(&content[SIZE_INDEX_HEADER..]);
        let total_length = body.u64("total length")?;
        let max_length = body.u64("maximum length")?;
        let min_length = body.u64("minimum length")?;
        let mut residue_counts = [0u64; MAX_CODES];
        for slot in &mut residue_counts {
            *slot = body.u64("residue counts")?;
        }
        let n_histogram = body.u64_array("unknown histogram", MAX_HISTOGRAM)?;
        let pos_histogram = body.u64_array("position histogram", MAX_HISTOGRAM)?;
        let qs_position_averages = body
            .u64_array("quality averages", MAX_HISTOGRAM)?
            .into_iter()
            .map(f64::from_bits)
            .collect();
        let global_qs_average = f64::from_bits(body.u64("global quality average")?);
        let n_blocks = body.u64("unknown blocks")?;
        let longest_n_block = body.u64("longest unknown block")?;
        let data_checksum = body.u64("data checksum")?;
        let quality_checksum = body.u64("quality checksum")?;
        let name_checksum = body.u64("name checksum")?;
        let suffix_checksum = body.u64("suffix checksum")?;
        let store_id = body.u64("store id")?;
        let comment = body.string("comment")?;
        let command_line = body.string("command line")?;
        let read_group = body.string("read group")?;
        if !body.is_exhausted() {
            return Err(CorruptStoreError::Decode {
                path: INDEX_FILE.into(),
                reason: "trailing bytes after the last field".to_string(),
            }
            .into());
        }

        let metadata = Self {
            version,
            max_file_size,
            sequence_type,
            has_quality: flags & FLAG_QUALITY != 0,
            has_names: flags & FLAG_NAMES != 0,
            has_suffixes: flags & FLAG_SUFFIXES != 0,
            total_length,
            max_length,
            min_length,
            number_sequences,
            residue_counts,
            n_histogram,
            pos_histogram,
            qs_position_averages,
            global_qs_average,
            n_blocks,
            longest_n_block,
            data_checksum,
            quality_checksum,
            name_checksum,
            suffix_checksum,
            store_id,
            comment,
            command_line,
            read_group,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// Checks the relationships between fields that must hold for every store
    fn validate(&self) -> Result<()> {
        let inconsistent = |reason: &str| -> Result<()> {
            Err(CorruptStoreError::Decode {
                path: INDEX_FILE.into(),
                reason: reason.to_string(),
            }
            .into())
        };
        if self.number_sequences > 0 && self.min_length > self.max_length {
            return inconsistent("minimum length exceeds maximum length");
        }
        if self.max_length > self.total_length {
            return inconsistent("maximum length exceeds total length");
        }
        if self.residue_counts[usize::from(self.sequence_type.num_codes())..]
            .iter()
            .any(|&c| c != 0)
        {
            return inconsistent("residue counts outside the alphabet");
        }
        if self.residue_counts.iter().sum::<u64>() != self.total_length {
            return inconsistent("residue counts do not sum to the total length");
        }
        Ok(())
    }

    /// Writes the index file into `dir` atomically (temporary file + rename)
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        let tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            writer.write_all(&self.to_bytes())?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, dir.join(INDEX_FILE))?;
        Ok(())
    }

    /// Reads the index file from `dir`
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(INDEX_FILE);
        if !path.is_file() {
            return Err(CorruptStoreError::MissingFile(path).into());
        }
        let buffer = fs::read(&path)?;
        Self::from_bytes(&buffer)
    }
}

struct FieldWriter(Vec<u8>);
impl FieldWriter {
    fn u64(&mut self, value: u64) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn string(&mut self, value: Option<&str>) {
        match value {
            Some(s) => {
                self.0
                    .extend_from_slice(&(s.len() as u32).to_le_bytes());
                self.0.extend_from_slice(s.as_bytes());
            }
            None => self.0.extend_from_slice(&NO_STRING.to_le_bytes()),
        }
    }
}

/// Bounds-checked cursor over the index body
struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}
impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(CorruptStoreError::UnexpectedEnd(field))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u64(&mut self, field: &'static str) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8, field)?))
    }

    fn u64_array(&mut self, field: &'static str, len: usize) -> Result<Vec<u64>> {
        let bytes = self.take(len * 8, field)?;
        Ok(bytes.chunks_exact(8).map(LittleEndian::read_u64).collect())
    }

    fn string(&mut self, field: &'static str) -> Result<Option<String>> {
        let len = LittleEndian::read_u32(self.take(4, field)?);
        if len == NO_STRING {
            return Ok(None);
        }
        let bytes = self.take(len as usize, field)?;
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(Some(s.to_string())),
            Err(e) => Err(CorruptStoreError::Decode {
                path: INDEX_FILE.into(),
                reason: format!("{field}: {e}"),
            }
            .into()),
        }
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.buf.len()
    }
}
