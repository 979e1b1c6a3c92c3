use crate::alphabet::SequenceType;

/// A borrowed view of one record, as handed to a
/// [`ParallelProcessor`](crate::ParallelProcessor)
#[derive(Debug, Clone, Copy)]
pub struct SequenceRecord<'a> {
    index: u64,
    sequence_type: SequenceType,
    name: &'a str,
    suffix: &'a str,
    residues: &'a [u8],
    quality: &'a [u8],
}
impl<'a> SequenceRecord<'a> {
    #[must_use]
    pub fn new(
        index: u64,
        sequence_type: SequenceType,
        name: &'a str,
        suffix: &'a str,
        residues: &'a [u8],
        quality: &'a [u8],
    ) -> Self {
        Self {
            index,
            sequence_type,
            name,
            suffix,
            residues,
            quality,
        }
    }

    /// Returns the global index of the record.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    #[must_use]
    pub fn sequence_type(&self) -> SequenceType {
        self.sequence_type
    }

    /// Returns the name label, or the decimal index if the store has no names
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Returns the name suffix, empty if there is none
    #[must_use]
    pub fn suffix(&self) -> &'a str {
        self.suffix
    }

    /// Returns the residue codes of the record
    #[must_use]
    pub fn residues(&self) -> &'a [u8] {
        self.residues
    }

    /// Returns the quality values of the record.
    ///
    /// Empty if no quality values are present.
    #[must_use]
    pub fn quality(&self) -> &'a [u8] {
        self.quality
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// A convenience function to check if record has associated quality values
    #[must_use]
    pub fn has_quality(&self) -> bool {
        !self.quality.is_empty()
    }

    /// Decodes the residues to ASCII, appending to `buf`
    pub fn decode(&self, buf: &mut Vec<u8>) {
        self.sequence_type.decode_codes(self.residues, buf);
    }
}
