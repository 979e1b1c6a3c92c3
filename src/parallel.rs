use std::ops::Range;

use crate::{reader::SequencesReader, record::SequenceRecord, ReadError, Result};

/// Number of records between calls to [`ParallelProcessor::on_batch_complete`]
pub const BATCH_SIZE: u64 = 1024;

/// Trait for readers that can process records in parallel
///
/// This is implemented by the **reader** not by the **processor**.
/// For the **processor**, see the [`ParallelProcessor`] trait.
///
/// Every reader gets this trait: each worker thread reads from its own
/// [`copy`](SequencesReader::copy) of the reader.
pub trait ParallelReader {
    /// Processes every record of the reader
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()>;

    /// Processes the records of `range`, in reader ids
    fn process_parallel_range<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: Range<u64>,
    ) -> Result<()>;
}

/// Trait for types that can process records in parallel.
///
/// This is implemented by the **processor** not by the **reader**.
/// For the **reader**, see the [`ParallelReader`] trait.
pub trait ParallelProcessor: Send + Clone {
    /// Process a single record
    fn process_record(&mut self, record: SequenceRecord<'_>) -> Result<()>;

    /// Called when a thread finishes processing its batch
    /// Default implementation does nothing
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    ///
    /// Each thread should call this method with its own unique ID.
    fn set_tid(&mut self, _tid: usize) {
        // Default implementation does nothing
    }

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

impl<R: SequencesReader + Send + 'static> ParallelReader for R {
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        let num_records = self.number_sequences();
        self.process_parallel_range(processor, num_threads, 0..num_records)
    }

    fn process_parallel_range<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: Range<u64>,
    ) -> Result<()> {
        // Calculate the number of threads to use
        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads.min(num_cpus::get())
        };

        // Validate range
        let num_records = self.number_sequences();
        if range.start > range.end || range.end > num_records {
            return Err(ReadError::InvalidRange {
                start: range.start,
                end: range.end,
                count: num_records,
            }
            .into());
        }
        if range.is_empty() {
            return Ok(());
        }

        // Calculate number of records for each thread within the range
        let records_per_thread = (range.end - range.start).div_ceil(num_threads as u64);

        let (range_start, range_end) = (range.start, range.end);

        // Build thread handles
        let mut handles = Vec::new();
        for tid in 0..num_threads {
            let mut processor = processor.clone();
            let reader = self.copy();
            processor.set_tid(tid);

            let handle = std::thread::spawn(move || -> Result<()> {
                let start_idx = range_start + tid as u64 * records_per_thread;
                let end_idx = (start_idx + records_per_thread).min(range_end);
                if start_idx >= end_idx {
                    return Ok(()); // No records for this thread
                }
                process_records(&reader, &mut processor, start_idx..end_idx)
            });
            handles.push(handle);
        }

        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("parallel worker thread panicked"))??;
        }
        Ok(())
    }
}

/// Feeds the records of `ids` to `processor`, one batch at a time
fn process_records<R: SequencesReader, P: ParallelProcessor>(
    reader: &R,
    processor: &mut P,
    ids: Range<u64>,
) -> Result<()> {
    let offset = reader.range().start;
    let sequence_type = reader.sequence_type();

    // create a reusable buffer for translating record IDs
    let mut translater = itoa::Buffer::new();

    // reusable decoding buffers
    let mut rbuf = Vec::new();
    let mut qbuf = Vec::new();

    for batch_start in ids.clone().step_by(BATCH_SIZE as usize) {
        let batch_end = (batch_start + BATCH_SIZE).min(ids.end);
        for id in batch_start..batch_end {
            let length = reader.length(id)? as usize;
            rbuf.resize(length, 0);
            reader.read(id, &mut rbuf)?;
            if reader.has_quality() {
                qbuf.resize(length, 0);
                reader.read_quality(id, &mut qbuf)?;
            } else {
                qbuf.clear();
            }
            let (name, suffix) = if reader.has_names() {
                (reader.name(id)?, reader.name_suffix(id)?)
            } else {
                (translater.format(offset + id).to_string(), String::new())
            };
            let record = SequenceRecord::new(
                offset + id,
                sequence_type,
                &name,
                &suffix,
                &rbuf,
                &qbuf,
            );
            processor.process_record(record)?;
        }
        processor.on_batch_complete()?;
    }
    Ok(())
}

#[cfg(test)]
mod testing {
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };

    use super::*;
    use crate::writer::SdfWriterBuilder;

    #[derive(Clone, Default)]
    struct Counter {
        residues: Arc<AtomicU64>,
        records: Arc<AtomicU64>,
        batches: Arc<AtomicU64>,
    }
    impl ParallelProcessor for Counter {
        fn process_record(&mut self, record: SequenceRecord<'_>) -> Result<()> {
            self.residues
                .fetch_add(record.len() as u64, Ordering::Relaxed);
            self.records.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn on_batch_complete(&mut self) -> Result<()> {
            self.batches.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[test]
    fn test_counts_every_record_once() -> Result<()> {
        let mut writer = SdfWriterBuilder::default().names(false).build_in_memory()?;
        for i in 0..3000u64 {
            writer.write(None, &vec![1; (i % 7) as usize], None)?;
        }
        let reader = writer.finish()?.into_reader();
        let expected = reader.index().total_length;

        let counter = Counter::default();
        reader.copy().process_parallel(counter.clone(), 4)?;
        assert_eq!(counter.records.load(Ordering::Relaxed), 3000);
        assert_eq!(counter.residues.load(Ordering::Relaxed), expected);
        assert!(counter.batches.load(Ordering::Relaxed) >= 3);

        let counter = Counter::default();
        reader.copy().process_parallel_range(counter.clone(), 2, 10..20)?;
        assert_eq!(counter.records.load(Ordering::Relaxed), 10);

        assert!(reader.process_parallel_range(Counter::default(), 2, 10..3001).is_err());
        Ok(())
    }
}
