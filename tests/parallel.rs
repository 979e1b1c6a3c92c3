mod common;

use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use common::{random_records, write_disk};
use parking_lot::Mutex;
use sdfstore::{
    DiskReader, MemoryReader, ParallelProcessor, ParallelReader, ReverseComplementReader,
    SequenceRecord, SequenceType, SequencesReader,
};

/// Collects the decoded residues of every record by index
#[derive(Clone, Default)]
struct Collector {
    local: Vec<(u64, String, Vec<u8>)>,
    tid: Option<usize>,
    global: Arc<Mutex<HashMap<u64, (String, Vec<u8>)>>>,
    threads: Arc<Mutex<Vec<usize>>>,
}
impl ParallelProcessor for Collector {
    fn process_record(&mut self, record: SequenceRecord<'_>) -> sdfstore::Result<()> {
        let mut ascii = Vec::new();
        record.decode(&mut ascii);
        self.local
            .push((record.index(), record.name().to_string(), ascii));
        Ok(())
    }

    fn on_batch_complete(&mut self) -> sdfstore::Result<()> {
        let mut global = self.global.lock();
        for (index, name, ascii) in self.local.drain(..) {
            assert!(global.insert(index, (name, ascii)).is_none());
        }
        if let Some(tid) = self.tid {
            self.threads.lock().push(tid);
        }
        Ok(())
    }

    fn set_tid(&mut self, tid: usize) {
        self.tid = Some(tid);
    }

    fn get_tid(&self) -> Option<usize> {
        self.tid
    }
}

#[test]
fn every_record_processed_once() -> Result<()> {
    let records = random_records(SequenceType::Dna, 2500, 50, 11);
    let dir = tempfile::tempdir()?;
    write_disk(dir.path(), SequenceType::Dna, 4096, &records)?;

    let disk = DiskReader::open(dir.path())?;
    let memory = MemoryReader::open(dir.path())?;
    for reader in [Box::new(disk) as Box<dyn Run>, Box::new(memory)] {
        let collector = Collector::default();
        reader.run(collector.clone())?;
        let global = collector.global.lock();
        assert_eq!(global.len(), records.len());
        for (index, record) in records.iter().enumerate() {
            let (name, ascii) = &global[&(index as u64)];
            let mut expected = Vec::new();
            SequenceType::Dna.decode_codes(&record.residues, &mut expected);
            assert_eq!(ascii, &expected);
            assert!(record.name.as_deref().unwrap().starts_with(name.as_str()));
        }
        assert!(!collector.threads.lock().is_empty());
    }
    Ok(())
}

trait Run {
    fn run(&self, collector: Collector) -> sdfstore::Result<()>;
}
impl<R: SequencesReader + Send + 'static> Run for R {
    fn run(&self, collector: Collector) -> sdfstore::Result<()> {
        self.copy().process_parallel(collector, 3)
    }
}

#[test]
fn range_of_a_decorated_reader() -> Result<()> {
    let records = random_records(SequenceType::Dna, 100, 20, 12);
    let dir = tempfile::tempdir()?;
    write_disk(dir.path(), SequenceType::Dna, 512, &records)?;

    let reader = ReverseComplementReader::new(MemoryReader::open(dir.path())?)?;
    let collector = Collector::default();
    reader.process_parallel_range(collector.clone(), 2, 40..60)?;

    let global = collector.global.lock();
    assert_eq!(global.len(), 20);
    let mut keys: Vec<u64> = global.keys().copied().collect();
    keys.sort_unstable();
    assert_eq!(keys, (40..60).collect::<Vec<_>>());

    let (_, ascii) = &global[&45];
    let mut expected = Vec::new();
    SequenceType::Dna.decode_codes(&records[45].residues, &mut expected);
    expected.reverse();
    for base in &mut expected {
        *base = match *base {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            other => other,
        };
    }
    assert_eq!(ascii, &expected);
    Ok(())
}
