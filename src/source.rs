//! Record producers
//!
//! Parsers feeding a store implement [`SequenceDataSource`]: a cursor over records
//! that is advanced once per record. [`SequencesWriter::write_source`] drains a
//! source into a store.
//!
//! [`SequencesWriter::write_source`]: crate::SequencesWriter::write_source

use auto_impl::auto_impl;

use crate::{alphabet::SequenceType, error::Result};

/// A sequential producer of records
///
/// The accessors describe the record the last successful
/// [`advance`](SequenceDataSource::advance) moved to.
#[auto_impl(&mut, Box)]
pub trait SequenceDataSource {
    /// Moves to the next record, returning false when the source is exhausted
    fn advance(&mut self) -> Result<bool>;

    /// Full name of the current record, if it has one
    fn name(&self) -> Option<&str>;

    /// Residue codes of the current record
    fn residues(&self) -> &[u8];

    /// Quality values of the current record, if the source carries any
    fn quality(&self) -> Option<&[u8]>;

    /// Alphabet of the residue codes
    fn sequence_type(&self) -> SequenceType;
}

/// One record held by a [`VecSource`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    pub name: Option<String>,
    pub residues: Vec<u8>,
    pub quality: Option<Vec<u8>>,
}
impl SourceRecord {
    #[must_use]
    pub fn new(name: Option<&str>, residues: &[u8], quality: Option<&[u8]>) -> Self {
        Self {
            name: name.map(str::to_string),
            residues: residues.to_vec(),
            quality: quality.map(<[u8]>::to_vec),
        }
    }
}

/// A source over records held in memory
#[derive(Debug, Clone)]
pub struct VecSource {
    sequence_type: SequenceType,
    records: Vec<SourceRecord>,
    /// Index of the current record plus one; zero before the first advance
    position: usize,
}
impl VecSource {
    #[must_use]
    pub fn new(sequence_type: SequenceType, records: Vec<SourceRecord>) -> Self {
        Self {
            sequence_type,
            records,
            position: 0,
        }
    }

    /// Encodes ASCII residues with the alphabet of `sequence_type`
    #[must_use]
    pub fn from_ascii<'a>(
        sequence_type: SequenceType,
        records: impl IntoIterator<Item = (&'a str, &'a [u8])>,
    ) -> Self {
        let mut codes = Vec::new();
        let records = records
            .into_iter()
            .map(|(name, ascii)| {
                codes.clear();
                sequence_type.encode_ascii(ascii, &mut codes);
                SourceRecord::new(Some(name), &codes, None)
            })
            .collect();
        Self::new(sequence_type, records)
    }

    fn current(&self) -> Option<&SourceRecord> {
        self.position
            .checked_sub(1)
            .and_then(|i| self.records.get(i))
    }
}
impl SequenceDataSource for VecSource {
    fn advance(&mut self) -> Result<bool> {
        if self.position < self.records.len() {
            self.position += 1;
            Ok(true)
        } else {
            self.position = self.records.len() + 1;
            Ok(false)
        }
    }

    fn name(&self) -> Option<&str> {
        self.current().and_then(|r| r.name.as_deref())
    }

    fn residues(&self) -> &[u8] {
        self.current().map_or(&[][..], |r| r.residues.as_slice())
    }

    fn quality(&self) -> Option<&[u8]> {
        self.current().and_then(|r| r.quality.as_deref())
    }

    fn sequence_type(&self) -> SequenceType {
        self.sequence_type
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::{reader::SequencesReader, writer::SdfWriterBuilder};

    #[test]
    fn test_vec_source_cursor() -> Result<()> {
        let mut source = VecSource::from_ascii(
            SequenceType::Dna,
            [("a", &b"ACGT"[..]), ("b", &b"NN"[..])],
        );
        assert!(source.residues().is_empty());
        assert!(source.advance()?);
        assert_eq!(source.name(), Some("a"));
        assert_eq!(source.residues(), &[1, 2, 3, 4]);
        assert!(source.advance()?);
        assert_eq!(source.residues(), &[0, 0]);
        assert!(!source.advance()?);
        assert_eq!(source.name(), None);
        assert!(!source.advance()?);
        Ok(())
    }

    #[test]
    fn test_write_source() -> Result<()> {
        let mut source = VecSource::new(
            SequenceType::Dna,
            vec![
                SourceRecord::new(Some("r1"), &[1, 2], Some(&[5, 6])),
                SourceRecord::new(None, &[3], Some(&[7])),
            ],
        );
        let mut writer = SdfWriterBuilder::default().quality(true).build_in_memory()?;
        assert_eq!(writer.write_source(&mut source)?, 2);
        let reader = writer.finish()?.into_reader();
        assert_eq!(reader.read_quality_vec(1)?, vec![7]);
        assert_eq!(reader.name(1)?, "Unnamed_sequence_0");

        let protein = VecSource::new(SequenceType::Protein, Vec::new());
        let mut writer = SdfWriterBuilder::default().build_in_memory()?;
        assert!(writer.write_source(protein).is_err());
        Ok(())
    }
}
