use std::path::Path;

use super::{check_request, Cursor, IdRange, SequencesReader};
use crate::{
    alphabet::{complement_dna, SequenceType},
    error::{ReadError, Result},
    index::IndexMetadata,
};

/// Presents every record of a DNA reader reverse-complemented
///
/// Residues are reversed and complemented and quality values reversed on the
/// fly. Names, lengths, statistics and the stored checksums are those of the
/// inner reader, and verification walks the inner reader.
pub struct ReverseComplementReader<R: SequencesReader> {
    inner: R,
}
impl<R: SequencesReader> ReverseComplementReader<R> {
    /// Wraps `inner`, which must hold DNA
    pub fn new(inner: R) -> Result<Self> {
        let found = inner.sequence_type();
        if found != SequenceType::Dna {
            return Err(ReadError::UnsupportedSequenceType {
                expected: SequenceType::Dna.name(),
                found: found.name(),
            }
            .into());
        }
        Ok(Self { inner })
    }

    #[must_use]
    pub fn inner(&self) -> &R {
        &self.inner
    }

    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads the mirror image of `[start, start + length)` and reverses it in place
    fn read_mirrored(
        &self,
        id: u64,
        out: &mut [u8],
        start: u64,
        length: u64,
        quality: bool,
    ) -> Result<usize> {
        let sequence_length = self.inner.length(id)?;
        check_request(start, length, sequence_length, out.len())?;
        let mirrored_start = sequence_length - start - length;
        let n = if quality {
            self.inner
                .read_quality_range(id, out, mirrored_start, length)?
        } else {
            self.inner.read_range(id, out, mirrored_start, length)?
        };
        out[..n].reverse();
        if !quality {
            for code in &mut out[..n] {
                *code = complement_dna(*code);
            }
        }
        Ok(n)
    }
}

impl<R: SequencesReader> SequencesReader for ReverseComplementReader<R> {
    fn index(&self) -> &IndexMetadata {
        self.inner.index()
    }

    fn range(&self) -> IdRange {
        self.inner.range()
    }

    fn cursor(&self) -> &Cursor {
        self.inner.cursor()
    }

    fn cursor_mut(&mut self) -> &mut Cursor {
        self.inner.cursor_mut()
    }

    fn has_quality(&self) -> bool {
        self.inner.has_quality()
    }

    fn has_names(&self) -> bool {
        self.inner.has_names()
    }

    fn stored_records(&self) -> &dyn SequencesReader
    where
        Self: Sized,
    {
        self.inner.stored_records()
    }

    fn length(&self, id: u64) -> Result<u64> {
        self.inner.length(id)
    }

    fn name(&self, id: u64) -> Result<String> {
        self.inner.name(id)
    }

    fn name_suffix(&self, id: u64) -> Result<String> {
        self.inner.name_suffix(id)
    }

    fn read_range(&self, id: u64, out: &mut [u8], start: u64, length: u64) -> Result<usize> {
        self.read_mirrored(id, out, start, length, false)
    }

    fn read_quality_range(
        &self,
        id: u64,
        out: &mut [u8],
        start: u64,
        length: u64,
    ) -> Result<usize> {
        self.read_mirrored(id, out, start, length, true)
    }

    fn data_checksum(&self, id: u64) -> Result<u8> {
        self.inner.data_checksum(id)
    }

    fn quality_checksum(&self, id: u64) -> Result<u8> {
        self.inner.quality_checksum(id)
    }

    fn name_checksum(&self, id: u64) -> Result<u8> {
        self.inner.name_checksum(id)
    }

    fn suffix_checksum(&self, id: u64) -> Result<u8> {
        self.inner.suffix_checksum(id)
    }

    fn path(&self) -> Option<&Path> {
        self.inner.path()
    }

    fn copy(&self) -> Self {
        Self {
            inner: self.inner.copy(),
        }
    }

    fn length_between(&self, start: u64, end: u64) -> Result<u64> {
        self.inner.length_between(start, end)
    }
}
