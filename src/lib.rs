//! # sdfstore
//!
//! A store for sequence data (residues, optional quality values and names) in
//! size-capped rolling files with per-record pointer tables, so any record can
//! be found by its id without scanning. Stores are read back on demand from disk
//! or loaded into bit-packed memory buffers, and carry per-record and global
//! checksums that [`verify()`] recomputes.
//!
//! # Crate layout
//!
//! * [`SdfWriterBuilder`] / [`SequencesWriter`] write a store, either into a
//!   directory of rolling files or into memory
//! * [`DiskReader`] and [`MemoryReader`] read it back through the shared
//!   [`SequencesReader`] trait
//! * [`verify()`] recomputes every checksum and statistic of a store
//! * [`ParallelReader`] spreads the records of any reader over worker threads

pub mod alphabet;
pub mod bitpack;
pub mod checksum;
pub mod error;
pub mod index;
pub mod names;
pub mod parallel;
pub mod policy;
pub mod reader;
pub mod record;
pub mod rolling;
pub mod source;
pub mod stats;
pub mod verify;
pub mod writer;

pub use alphabet::SequenceType;
pub use bitpack::BitPackedArray;
pub use error::{
    CorruptStoreError, Error, FormatError, PackError, ReadError, Result, WriteError,
};
pub use index::IndexMetadata;
pub use parallel::{ParallelProcessor, ParallelReader};
pub use policy::ResiduePolicy;
pub use reader::{
    DiskReader, IdRange, LoadRange, MemoryReader, MemoryReaderBuilder, ReverseComplementReader,
    SequencesReader,
};
pub use record::SequenceRecord;
pub use source::{SequenceDataSource, SourceRecord, VecSource};
pub use verify::{verify, verify_dir, verify_report, Mismatch};
pub use writer::{
    DiskSink, MemorySink, MemoryStore, SdfWriterBuilder, SequencesWriter, Sink, WriteSummary,
};
