//! Single-pass statistics accumulator
//!
//! [`Statistics`] is fed every record in id order, by the writer while the store
//! is produced and by the verifier while it is read back, so both sides compute
//! lengths, histograms, quality averages and checksums with the same code.

use crate::{
    alphabet::{SequenceType, MAX_CODES},
    checksum::{record_checksum, GlobalChecksum},
    index::{IndexMetadata, MAX_HISTOGRAM},
};

/// Running statistics of a stream of records
#[derive(Debug, Clone)]
pub struct Statistics {
    sequence_type: SequenceType,

    number_sequences: u64,
    total_length: u64,
    max_length: u64,
    min_length: u64,

    residue_counts: [u64; MAX_CODES],
    n_histogram: Vec<u64>,
    pos_histogram: Vec<u64>,
    n_blocks: u64,
    longest_n_block: u64,

    /// Sum and count of all quality values
    qs_sum: u64,
    qs_count: u64,

    /// Per-position sums and counts of quality values
    qs_pos_sums: Vec<u64>,
    qs_pos_counts: Vec<u64>,

    data: GlobalChecksum,
    quality: GlobalChecksum,
    name: GlobalChecksum,
    suffix: GlobalChecksum,
}
impl Statistics {
    #[must_use]
    pub fn new(sequence_type: SequenceType) -> Self {
        Self {
            sequence_type,
            number_sequences: 0,
            total_length: 0,
            max_length: 0,
            min_length: u64::MAX,
            residue_counts: [0; MAX_CODES],
            n_histogram: vec![0; MAX_HISTOGRAM],
            pos_histogram: vec![0; MAX_HISTOGRAM],
            n_blocks: 0,
            longest_n_block: 0,
            qs_sum: 0,
            qs_count: 0,
            qs_pos_sums: vec![0; MAX_HISTOGRAM],
            qs_pos_counts: vec![0; MAX_HISTOGRAM],
            data: GlobalChecksum::new(),
            quality: GlobalChecksum::new(),
            name: GlobalChecksum::new(),
            suffix: GlobalChecksum::new(),
        }
    }

    #[must_use]
    pub fn number_sequences(&self) -> u64 {
        self.number_sequences
    }

    #[must_use]
    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Records the residues of the next sequence and returns its checksum
    ///
    /// Every call counts one sequence. Codes outside the counting arrays are
    /// ignored by the residue counts but still enter the checksum.
    pub fn add_residues(&mut self, residues: &[u8]) -> u8 {
        let length = residues.len() as u64;
        self.number_sequences += 1;
        self.total_length += length;
        self.max_length = self.max_length.max(length);
        self.min_length = self.min_length.min(length);

        let mut unknown = 0u64;
        let mut run = 0u64;
        for (pos, &code) in residues.iter().enumerate() {
            if let Some(count) = self.residue_counts.get_mut(usize::from(code)) {
                *count += 1;
            }
            if self.sequence_type.is_unknown(code) {
                self.pos_histogram[pos.min(MAX_HISTOGRAM - 1)] += 1;
                if run == 0 {
                    self.n_blocks += 1;
                }
                run += 1;
                unknown += 1;
            } else {
                self.longest_n_block = self.longest_n_block.max(run);
                run = 0;
            }
        }
        self.longest_n_block = self.longest_n_block.max(run);
        self.n_histogram[(unknown as usize).min(MAX_HISTOGRAM - 1)] += 1;

        let cs = record_checksum(residues);
        self.data.fold(cs, length);
        cs
    }

    /// Records the quality values of the current sequence and returns their checksum
    pub fn add_quality(&mut self, quality: &[u8]) -> u8 {
        for (pos, &q) in quality.iter().enumerate() {
            self.qs_sum += u64::from(q);
            self.qs_count += 1;
            if pos < MAX_HISTOGRAM {
                self.qs_pos_sums[pos] += u64::from(q);
                self.qs_pos_counts[pos] += 1;
            }
        }
        let cs = record_checksum(quality);
        self.quality.fold(cs, quality.len() as u64);
        cs
    }

    /// Records the name label of the current sequence and returns its checksum
    pub fn add_name(&mut self, label: &[u8]) -> u8 {
        let cs = record_checksum(label);
        self.name.fold(cs, label.len() as u64);
        cs
    }

    /// Records the name suffix of the current sequence and returns its checksum
    pub fn add_suffix(&mut self, suffix: &[u8]) -> u8 {
        let cs = record_checksum(suffix);
        self.suffix.fold(cs, suffix.len() as u64);
        cs
    }

    /// Copies the accumulated values into `metadata`
    ///
    /// Fields that describe the configuration of the store (alphabet, flags,
    /// provenance, store id) are left untouched.
    #[allow(clippy::cast_precision_loss)]
    pub fn apply(&self, metadata: &mut IndexMetadata) {
        metadata.number_sequences = self.number_sequences;
        metadata.total_length = self.total_length;
        metadata.max_length = self.max_length;
        metadata.min_length = if self.number_sequences == 0 {
            0
        } else {
            self.min_length
        };
        metadata.residue_counts = self.residue_counts;
        metadata.n_histogram.clone_from(&self.n_histogram);
        metadata.pos_histogram.clone_from(&self.pos_histogram);
        metadata.n_blocks = self.n_blocks;
        metadata.longest_n_block = self.longest_n_block;
        metadata.global_qs_average = if self.qs_count == 0 {
            0.0
        } else {
            self.qs_sum as f64 / self.qs_count as f64
        };
        metadata.qs_position_averages = self
            .qs_pos_sums
            .iter()
            .zip(&self.qs_pos_counts)
            .map(|(&sum, &count)| {
                if count == 0 {
                    0.0
                } else {
                    sum as f64 / count as f64
                }
            })
            .collect();
        metadata.data_checksum = self.data.finish();
        metadata.quality_checksum = self.quality.finish();
        metadata.name_checksum = self.name.finish();
        metadata.suffix_checksum = self.suffix.finish();
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    fn applied(stats: &Statistics) -> IndexMetadata {
        let mut meta = IndexMetadata::new(SequenceType::Dna, 1024);
        stats.apply(&mut meta);
        meta
    }

    #[test]
    fn lengths_and_counts() {
        let mut stats = Statistics::new(SequenceType::Dna);
        stats.add_residues(&[1, 2, 3, 4]);
        stats.add_residues(&[]);
        stats.add_residues(&[4, 4]);
        let meta = applied(&stats);
        assert_eq!(meta.number_sequences, 3);
        assert_eq!(meta.total_length, 6);
        assert_eq!(meta.max_length, 4);
        assert_eq!(meta.min_length, 0);
        assert_eq!(meta.residue_counts[4], 3);
        assert_eq!(meta.residue_counts.iter().sum::<u64>(), 6);
    }

    #[test]
    fn empty_store_has_zero_lengths() {
        let meta = applied(&Statistics::new(SequenceType::Dna));
        assert_eq!(meta.min_length, 0);
        assert_eq!(meta.max_length, 0);
        assert_eq!(meta.n_histogram.iter().sum::<u64>(), 0);
    }

    #[test]
    fn unknown_blocks() {
        let mut stats = Statistics::new(SequenceType::Dna);
        // N N A N N N C N
        stats.add_residues(&[0, 0, 1, 0, 0, 0, 2, 0]);
        stats.add_residues(&[1, 1]);
        let meta = applied(&stats);
        assert_eq!(meta.n_blocks, 3);
        assert_eq!(meta.longest_n_block, 3);
        assert_eq!(meta.n_histogram[6], 1);
        assert_eq!(meta.n_histogram[0], 1);
        assert_eq!(meta.pos_histogram[0], 1);
        assert_eq!(meta.pos_histogram[2], 0);
        assert_eq!(meta.pos_histogram[7], 1);
    }

    #[test]
    fn histograms_saturate() {
        let mut stats = Statistics::new(SequenceType::Dna);
        stats.add_residues(&vec![0; MAX_HISTOGRAM + 10]);
        let meta = applied(&stats);
        assert_eq!(meta.n_histogram[MAX_HISTOGRAM - 1], 1);
        assert_eq!(meta.pos_histogram[MAX_HISTOGRAM - 1], 11);
        assert_eq!(meta.longest_n_block, (MAX_HISTOGRAM + 10) as u64);
    }

    #[test]
    fn quality_averages() {
        let mut stats = Statistics::new(SequenceType::Dna);
        stats.add_residues(&[1, 2]);
        stats.add_quality(&[10, 20]);
        stats.add_residues(&[3]);
        stats.add_quality(&[30]);
        let meta = applied(&stats);
        assert!((meta.global_qs_average - 20.0).abs() < f64::EPSILON);
        assert!((meta.qs_position_averages[0] - 20.0).abs() < f64::EPSILON);
        assert!((meta.qs_position_averages[1] - 20.0).abs() < f64::EPSILON);
        assert!(meta.qs_position_averages[2].abs() < f64::EPSILON);
    }

    #[test]
    fn protein_unknowns_include_stop() {
        let mut stats = Statistics::new(SequenceType::Protein);
        stats.add_residues(&[0, 1, 2, 1]);
        let meta = applied(&stats);
        assert_eq!(meta.n_blocks, 2);
        assert_eq!(meta.longest_n_block, 2);
    }
}
