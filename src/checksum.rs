//! Checksums shared by the writer and the verifier
//!
//! Every record gets a one-byte checksum over its stored bytes. The per-record
//! checksums and record lengths are folded, in id order, into a 64-bit global
//! checksum per file kind. Each step of both folds is a bijection of the running
//! state, so changing any single byte of a record changes both values.

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{CorruptStoreError, Result};

/// Size of the trailing checksum that seals index and pointer files
pub const SEAL_SIZE: usize = 8;

/// FNV-1a 64-bit offset basis
#[allow(clippy::unreadable_literal)]
pub const GLOBAL_SEED: u64 = 0xcbf29ce484222325;

/// FNV-1a 64-bit prime
#[allow(clippy::unreadable_literal)]
const GLOBAL_PRIME: u64 = 0x00000100000001b3;

/// Order-sensitive one-byte checksum of a single record
///
/// `h = rotl(h, 1) * 31 ^ byte` starting from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordChecksum {
    state: u8,
}
impl RecordChecksum {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, byte: u8) {
        self.state = self.state.rotate_left(1).wrapping_mul(31) ^ byte;
    }

    pub fn update_slice(&mut self, bytes: &[u8]) {
        bytes.iter().for_each(|&b| self.update(b));
    }

    #[must_use]
    pub fn finish(&self) -> u8 {
        self.state
    }
}

/// Convenience for the checksum of a complete record
#[must_use]
pub fn record_checksum(bytes: &[u8]) -> u8 {
    let mut cs = RecordChecksum::new();
    cs.update_slice(bytes);
    cs.finish()
}

/// 64-bit fold of per-record checksums and lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalChecksum {
    state: u64,
}
impl Default for GlobalChecksum {
    fn default() -> Self {
        Self { state: GLOBAL_SEED }
    }
}
impl GlobalChecksum {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mix(&mut self, byte: u8) {
        self.state ^= u64::from(byte);
        self.state = self.state.wrapping_mul(GLOBAL_PRIME);
    }

    /// Folds one record into the global checksum
    pub fn fold(&mut self, record_checksum: u8, length: u64) {
        self.mix(record_checksum);
        length.to_le_bytes().iter().for_each(|&b| self.mix(b));
    }

    #[must_use]
    pub fn finish(&self) -> u64 {
        self.state
    }
}

/// FNV-1a 64-bit hash of a byte buffer
#[must_use]
pub fn fnv64(bytes: &[u8]) -> u64 {
    let mut cs = GlobalChecksum::new();
    bytes.iter().for_each(|&b| cs.mix(b));
    cs.finish()
}

/// Appends the FNV-1a checksum of `buf` to `buf`
pub fn append_seal(buf: &mut Vec<u8>) {
    let seal = fnv64(buf);
    buf.extend_from_slice(&seal.to_le_bytes());
}

/// Checks the trailing checksum of a sealed file and returns the sealed content
///
/// `path` only labels the error.
pub fn verify_seal<'a>(buffer: &'a [u8], path: &Path) -> Result<&'a [u8]> {
    if buffer.len() < SEAL_SIZE {
        return Err(CorruptStoreError::UnexpectedEnd("file checksum").into());
    }
    let (content, seal) = buffer.split_at(buffer.len() - SEAL_SIZE);
    let stored = LittleEndian::read_u64(seal);
    let computed = fnv64(content);
    if stored != computed {
        return Err(CorruptStoreError::FileChecksumMismatch {
            path: path.to_path_buf(),
            stored,
            computed,
        }
        .into());
    }
    Ok(content)
}
