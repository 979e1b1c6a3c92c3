//! Integrity verification
//!
//! The verifier walks every record through the normal read path, recomputes
//! per-record checksums and, when the reader covers the whole store, every
//! statistic of the index with the same [`Statistics`] accumulator the writer
//! uses. Stored and recomputed values are then compared field by field.

use std::{fmt, path::Path};

use crate::{
    index::{IndexMetadata, MAX_QUALITY},
    reader::{MemoryReader, SequencesReader},
    stats::Statistics,
    Result,
};

/// One value that differs between the store and its recomputation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Name of the differing field
    pub field: &'static str,
    /// Record the mismatch was found in, for per-record values
    pub id: Option<u64>,
}
impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} mismatch at sequence {id}", self.field),
            None => write!(f, "{} mismatch", self.field),
        }
    }
}

/// Returns true if every record and statistic of `reader` matches its index
///
/// Structural errors met while reading are returned as errors.
pub fn verify<R: SequencesReader>(reader: &R) -> Result<bool> {
    Ok(verify_report(reader)?.is_empty())
}

/// Opens the store at `dir` into memory and verifies it
///
/// Any error while opening or reading counts as a failed verification.
pub fn verify_dir<P: AsRef<Path>>(dir: P) -> bool {
    let dir = dir.as_ref();
    match MemoryReader::open(dir).and_then(|reader| verify(&reader)) {
        Ok(valid) => valid,
        Err(e) => {
            log::warn!("Verification of {} failed: {e}", dir.display());
            false
        }
    }
}

/// Lists every mismatch between `reader` and its index
///
/// Decorators are verified through the records they wrap. Name checksums are
/// skipped for readers opened without names.
pub fn verify_report<R: SequencesReader>(reader: &R) -> Result<Vec<Mismatch>> {
    report_stored(reader.stored_records())
}

fn report_stored(reader: &dyn SequencesReader) -> Result<Vec<Mismatch>> {
    let index = reader.index();
    let with_names = index.has_names && reader.has_names();
    let sequence_type = index.sequence_type;
    let offset = reader.range().start;
    let mut stats = Statistics::new(sequence_type);
    let mut mismatches = Vec::new();
    let mut per_record = |field, id: u64, found: bool| {
        if !found {
            mismatches.push(Mismatch {
                field,
                id: Some(offset + id),
            });
        }
    };

    for id in 0..reader.number_sequences() {
        let residues = reader.read_vec(id)?;
        per_record(
            "residue code",
            id,
            residues.iter().all(|&c| sequence_type.is_valid_code(c)),
        );
        let checksum = stats.add_residues(&residues);
        per_record("sequence checksum", id, checksum == reader.data_checksum(id)?);

        if index.has_quality {
            let quality = reader.read_quality_vec(id)?;
            per_record(
                "quality value",
                id,
                quality.iter().all(|&q| q <= MAX_QUALITY),
            );
            let checksum = stats.add_quality(&quality);
            per_record("quality checksum", id, checksum == reader.quality_checksum(id)?);
        }

        if with_names {
            let checksum = stats.add_name(reader.name(id)?.as_bytes());
            per_record("name checksum", id, checksum == reader.name_checksum(id)?);
            let checksum = stats.add_suffix(reader.name_suffix(id)?.as_bytes());
            per_record("suffix checksum", id, checksum == reader.suffix_checksum(id)?);
        }
    }

    if reader.range().covers(index.number_sequences) {
        let mut expected = index.clone();
        stats.apply(&mut expected);
        if !with_names {
            expected.name_checksum = index.name_checksum;
            expected.suffix_checksum = index.suffix_checksum;
        }
        compare_statistics(index, &expected, &mut mismatches);
    }
    for mismatch in &mismatches {
        log::debug!("{mismatch}");
    }
    Ok(mismatches)
}

/// Compares every recomputed field of the index with the stored one
#[allow(clippy::float_cmp)]
fn compare_statistics(stored: &IndexMetadata, expected: &IndexMetadata, out: &mut Vec<Mismatch>) {
    let fields = [
        ("number of sequences", stored.number_sequences == expected.number_sequences),
        ("total length", stored.total_length == expected.total_length),
        ("maximum length", stored.max_length == expected.max_length),
        ("minimum length", stored.min_length == expected.min_length),
        ("residue counts", stored.residue_counts == expected.residue_counts),
        ("unknown histogram", stored.n_histogram == expected.n_histogram),
        ("unknown position histogram", stored.pos_histogram == expected.pos_histogram),
        ("unknown blocks", stored.n_blocks == expected.n_blocks),
        ("longest unknown block", stored.longest_n_block == expected.longest_n_block),
        ("quality averages", stored.qs_position_averages == expected.qs_position_averages),
        ("global quality average", stored.global_qs_average == expected.global_qs_average),
        ("sequence data checksum", stored.data_checksum == expected.data_checksum),
        ("quality data checksum", stored.quality_checksum == expected.quality_checksum),
        ("name data checksum", stored.name_checksum == expected.name_checksum),
        ("suffix data checksum", stored.suffix_checksum == expected.suffix_checksum),
    ];
    out.extend(
        fields
            .into_iter()
            .filter(|(_, equal)| !equal)
            .map(|(field, _)| Mismatch { field, id: None }),
    );
}
