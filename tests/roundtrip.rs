mod common;

use anyhow::Result;
use common::{builder, random_records, write_disk};
use sdfstore::{
    verify, DiskReader, LoadRange, MemoryReader, MemoryReaderBuilder, SequenceType,
    SequencesReader,
};

fn assert_same_records<A: SequencesReader, B: SequencesReader>(a: &A, b: &B) -> Result<()> {
    assert_eq!(a.number_sequences(), b.number_sequences());
    for id in 0..a.number_sequences() {
        assert_eq!(a.length(id)?, b.length(id)?);
        assert_eq!(a.read_vec(id)?, b.read_vec(id)?);
        assert_eq!(a.read_quality_vec(id)?, b.read_quality_vec(id)?);
        assert_eq!(a.name(id)?, b.name(id)?);
        assert_eq!(a.name_suffix(id)?, b.name_suffix(id)?);
        assert_eq!(a.data_checksum(id)?, b.data_checksum(id)?);
        assert_eq!(a.quality_checksum(id)?, b.quality_checksum(id)?);
        assert_eq!(a.name_checksum(id)?, b.name_checksum(id)?);
    }
    Ok(())
}

#[test]
fn disk_and_memory_round_trip() -> Result<()> {
    for (sequence_type, seed) in [(SequenceType::Dna, 1), (SequenceType::Protein, 2)] {
        let records = random_records(sequence_type, 200, 90, seed);
        let dir = tempfile::tempdir()?;
        let summary = write_disk(dir.path(), sequence_type, 256, &records)?;
        assert_eq!(summary.number_sequences, 200);

        let mut writer = builder(sequence_type, 256).build_in_memory()?;
        for record in &records {
            writer.write(
                record.name.as_deref(),
                &record.residues,
                record.quality.as_deref(),
            )?;
        }
        let in_memory = writer.finish()?.into_reader();

        let disk = DiskReader::open(dir.path())?;
        let loaded = MemoryReader::open(dir.path())?;
        for (id, record) in records.iter().enumerate() {
            assert_eq!(disk.read_vec(id as u64)?, record.residues);
            assert_eq!(
                Some(disk.full_name(id as u64)?.as_str()),
                record.name.as_deref()
            );
        }
        assert_same_records(&disk, &loaded)?;
        assert_same_records(&disk, &in_memory)?;
        assert_eq!(disk.index(), in_memory.index());
        assert_eq!(disk.store_id(), 0x5eed);

        assert!(verify(&disk)?);
        assert!(verify(&loaded)?);
        assert!(verify(&in_memory)?);
    }
    Ok(())
}

#[test]
fn statistics_match_records() -> Result<()> {
    let records = random_records(SequenceType::Dna, 64, 40, 3);
    let dir = tempfile::tempdir()?;
    write_disk(dir.path(), SequenceType::Dna, 1 << 20, &records)?;
    let reader = DiskReader::open(dir.path())?;
    let index = reader.index();

    let lengths: Vec<u64> = records.iter().map(|r| r.residues.len() as u64).collect();
    assert_eq!(index.total_length, lengths.iter().sum::<u64>());
    assert_eq!(index.max_length, *lengths.iter().max().unwrap());
    assert_eq!(index.min_length, 0);
    assert_eq!(reader.sequence_lengths(0, 64)?, lengths);
    assert_eq!(reader.length_between(10, 20)?, lengths[10..20].iter().sum::<u64>());

    let mut counts = [0u64; 5];
    for record in &records {
        for &code in &record.residues {
            counts[usize::from(code)] += 1;
        }
    }
    assert_eq!(&reader.residue_counts()[..5], &counts);
    assert!(reader.residue_counts()[5..].iter().all(|&c| c == 0));
    assert_eq!(reader.histogram().iter().sum::<u64>(), 64);
    Ok(())
}

#[test]
fn range_semantics() -> Result<()> {
    let records = random_records(SequenceType::Dna, 30, 25, 4);
    let dir = tempfile::tempdir()?;
    write_disk(dir.path(), SequenceType::Dna, 64, &records)?;
    let full = DiskReader::open(dir.path())?;

    let disk = DiskReader::open_range(dir.path(), LoadRange::new(10, 20))?;
    let memory = MemoryReader::open_range(dir.path(), LoadRange::new(10, 20))?;
    assert_eq!(disk.number_sequences(), 10);
    assert_eq!(memory.number_sequences(), 10);
    for id in 0..10 {
        assert_eq!(disk.read_vec(id)?, full.read_vec(id + 10)?);
        assert_eq!(memory.name(id)?, full.name(id + 10)?);
    }
    assert!(disk.read_vec(10).unwrap_err().is_out_of_range());
    assert!(verify(&disk)?);
    assert!(verify(&memory)?);

    let clamped = MemoryReaderBuilder::default()
        .range(LoadRange::new(25, 1000))
        .open(dir.path())?;
    assert!(clamped.range().was_clamped());
    assert_eq!(clamped.number_sequences(), 5);

    let empty = DiskReader::open_range(dir.path(), LoadRange::from_start(30))?;
    assert_eq!(empty.number_sequences(), 0);
    assert!(MemoryReader::open_range(dir.path(), LoadRange::from_start(31)).is_err());
    assert!(DiskReader::open_range(dir.path(), LoadRange::new(20, 10)).is_err());
    Ok(())
}

#[test]
fn records_span_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut writer = builder(SequenceType::Dna, 20).build(dir.path())?;
    writer.write(Some("a"), &[1; 12], Some(&[10; 12]))?;
    writer.write(Some("b"), &[2; 30], Some(&[20; 30]))?;
    writer.write(Some("c"), &[3; 5], Some(&[30; 5]))?;
    writer.finish()?;

    for n in 0..3 {
        let path = dir.path().join(format!("seqdata{n}"));
        assert!(std::fs::metadata(path)?.len() <= 20);
    }
    let disk = DiskReader::open(dir.path())?;
    let memory = MemoryReader::open(dir.path())?;
    assert_eq!(disk.read_vec(1)?, vec![2; 30]);
    assert_eq!(memory.read_quality_vec(1)?, vec![20; 30]);

    let mut out = [0u8; 10];
    disk.read_range(1, &mut out, 5, 10)?;
    assert_eq!(out, [2; 10]);
    assert!(verify(&disk)?);
    Ok(())
}

#[test]
fn zero_length_records() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut writer = builder(SequenceType::Protein, 20).build(dir.path())?;
    writer.write(Some("empty0"), &[], Some(&[]))?;
    writer.write(Some("full"), &[5; 20], Some(&[1; 20]))?;
    writer.write(Some("empty1"), &[], Some(&[]))?;
    writer.write(Some("empty2"), &[], Some(&[]))?;
    let summary = writer.finish()?;
    assert_eq!(summary.zero_length, 3);

    for reader in [
        Box::new(DiskReader::open(dir.path())?) as Box<dyn ReaderCheck>,
        Box::new(MemoryReader::open(dir.path())?),
    ] {
        reader.check()?;
    }
    Ok(())
}

/// Object-safe wrapper to run the same checks over both readers
trait ReaderCheck {
    fn check(&self) -> Result<()>;
}
impl<R: SequencesReader> ReaderCheck for R {
    fn check(&self) -> Result<()> {
        assert_eq!(self.number_sequences(), 4);
        assert_eq!(self.length(0)?, 0);
        assert_eq!(self.read(0, &mut [])?, 0);
        assert_eq!(self.name(2)?, "empty1");
        assert_eq!(self.name(3)?, "empty2");
        assert_eq!(self.length_between(2, 4)?, 0);
        assert_eq!(self.index().min_length, 0);
        assert_eq!(self.index().max_length, 20);
        assert!(verify(self)?);
        Ok(())
    }
}

#[test]
fn cursor_state_machine() -> Result<()> {
    let records = random_records(SequenceType::Dna, 5, 10, 5);
    let dir = tempfile::tempdir()?;
    write_disk(dir.path(), SequenceType::Dna, 20, &records)?;
    let mut reader = MemoryReader::open(dir.path())?;

    assert!(reader.current_id().unwrap_err().is_no_current_record());
    reader.seek(3)?;
    assert!(reader.seek(5).unwrap_err().is_out_of_range());
    assert_eq!(reader.current_id()?, 3);
    assert!(reader.next_sequence());
    assert_eq!(reader.current_id()?, 4);
    assert!(!reader.next_sequence());
    assert!(reader.current_length().unwrap_err().is_no_current_record());
    assert!(!reader.next_sequence());

    reader.reset();
    let mut visited = 0;
    while reader.next_sequence() {
        let mut buf = vec![0; reader.current_length()? as usize];
        reader.read_current(&mut buf)?;
        assert_eq!(buf, records[visited].residues);
        visited += 1;
    }
    assert_eq!(visited, 5);
    Ok(())
}

#[test]
fn packed_memory_is_smaller() -> Result<()> {
    let records = random_records(SequenceType::Dna, 100, 200, 6);
    let dir = tempfile::tempdir()?;
    let summary = write_disk(dir.path(), SequenceType::Dna, 1 << 20, &records)?;
    let reader = MemoryReaderBuilder::default()
        .load_names(false)
        .open(dir.path())?;
    // 3-bit residues and 6-bit quality values against one byte each on disk
    assert!((reader.bytes() as u64) < summary.total_length * 2);
    Ok(())
}

#[test]
fn out_of_range_ids_are_errors() -> Result<()> {
    let records = random_records(SequenceType::Dna, 2, 10, 13);
    let dir = tempfile::tempdir()?;
    write_disk(dir.path(), SequenceType::Dna, 20, &records)?;

    let disk = DiskReader::open(dir.path())?;
    let memory = MemoryReader::open(dir.path())?;
    let readers = [
        Box::new(disk) as Box<dyn OutOfRangeCheck>,
        Box::new(memory),
    ];
    for reader in readers {
        reader.check_out_of_range()?;
    }
    Ok(())
}

trait OutOfRangeCheck {
    fn check_out_of_range(&self) -> Result<()>;
}
impl<R: SequencesReader> OutOfRangeCheck for R {
    fn check_out_of_range(&self) -> Result<()> {
        let mut out = [0u8; 4];
        for id in [2, u64::MAX] {
            assert!(self.length(id).unwrap_err().is_out_of_range());
            assert!(self.read(id, &mut out).unwrap_err().is_out_of_range());
            assert!(self
                .read_range(id, &mut out, 0, 1)
                .unwrap_err()
                .is_out_of_range());
            assert!(self.read_quality(id, &mut out).unwrap_err().is_out_of_range());
            assert!(self.name(id).unwrap_err().is_out_of_range());
            assert!(self.data_checksum(id).unwrap_err().is_out_of_range());
        }
        let err = self.read_range(0, &mut out, u64::MAX, 1).unwrap_err();
        assert!(!err.is_out_of_range() && !err.is_corrupt());
        Ok(())
    }
}
