#![allow(dead_code)]

use std::path::Path;

use rand::{rngs::SmallRng, Rng, SeedableRng};
use sdfstore::{Result, SdfWriterBuilder, SequenceType, SourceRecord, WriteSummary};

/// Random records of `sequence_type`, some empty, some with name suffixes
pub fn random_records(
    sequence_type: SequenceType,
    n: usize,
    max_length: usize,
    seed: u64,
) -> Vec<SourceRecord> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let length = if i % 7 == 3 {
                0
            } else {
                rng.random_range(0..=max_length)
            };
            let residues: Vec<u8> = (0..length)
                .map(|_| rng.random_range(0..sequence_type.num_codes()))
                .collect();
            let quality: Vec<u8> = (0..length).map(|_| rng.random_range(0..64)).collect();
            let name = if i % 3 == 0 {
                format!("read{i} lane={}", i % 4)
            } else {
                format!("read{i}")
            };
            SourceRecord::new(Some(&name), &residues, Some(&quality))
        })
        .collect()
}

pub fn builder(sequence_type: SequenceType, max_file_size: u64) -> SdfWriterBuilder {
    SdfWriterBuilder::default()
        .sequence_type(sequence_type)
        .quality(true)
        .max_file_size(max_file_size)
        .store_id(0x5eed)
}

/// Writes `records` into a store at `dir`
pub fn write_disk(
    dir: &Path,
    sequence_type: SequenceType,
    max_file_size: u64,
    records: &[SourceRecord],
) -> Result<WriteSummary> {
    let mut writer = builder(sequence_type, max_file_size).build(dir)?;
    for record in records {
        writer.write(
            record.name.as_deref(),
            &record.residues,
            record.quality.as_deref(),
        )?;
    }
    writer.finish()
}

/// Every regular file of a store directory, sorted by name
pub fn store_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
