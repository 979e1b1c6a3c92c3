use std::path::PathBuf;

/// Custom Result type for store operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the store, encompassing all possible error cases
/// that can occur while writing, opening, reading or verifying a store.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to the index and pointer headers
    FormatError(#[from] FormatError),
    /// Structurally invalid or truncated store contents
    CorruptStoreError(#[from] CorruptStoreError),
    /// Errors that occur during read operations
    ReadError(#[from] ReadError),
    /// Errors that occur during write operations
    WriteError(#[from] WriteError),
    /// Errors raised by the bit-packed arrays
    PackError(#[from] PackError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}
impl Error {
    /// True if the stored format version is newer than this build understands
    #[must_use]
    pub fn is_format_version(&self) -> bool {
        matches!(
            self,
            Self::FormatError(FormatError::UnsupportedVersion { .. })
        )
    }

    /// True for every kind of structural damage to the store.
    ///
    /// Header problems other than a newer version count as corruption, since a
    /// store written by this library always carries valid magic and reserved bytes.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        match self {
            Self::CorruptStoreError(_) => true,
            Self::FormatError(e) => !matches!(e, FormatError::UnsupportedVersion { .. }),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_no_current_record(&self) -> bool {
        matches!(self, Self::ReadError(ReadError::NoCurrentRecord))
    }

    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::ReadError(ReadError::OutOfRange { .. }))
    }

    #[must_use]
    pub fn is_buffer_size(&self) -> bool {
        matches!(self, Self::ReadError(ReadError::BufferTooSmall { .. }))
    }

    #[must_use]
    pub fn is_size_limit(&self) -> bool {
        matches!(self, Self::WriteError(WriteError::SizeLimit { .. }))
    }
}

/// Errors specific to processing and validating the fixed-size headers of the
/// index file, rolling indices and pointer files
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// The magic number in the header does not match the expected value
    ///
    /// # Arguments
    /// * `u32` - The invalid magic number that was found
    #[error("Invalid magic number: {0:#010x}")]
    InvalidMagicNumber(u32),

    /// The stored format version is newer than this implementation supports
    #[error("Store format version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// The stored format version is older than any version ever written
    #[error("Invalid format version: {0}")]
    InvalidVersion(u32),

    /// The reserved bytes in the header contain unexpected values
    #[error("Invalid reserved bytes")]
    InvalidReservedBytes,

    /// The sequence type tag is not one of the known alphabets
    #[error("Invalid sequence type tag: {0}")]
    InvalidSequenceType(u8),

    /// The pointer layout tag is not one of the known layouts
    #[error("Invalid pointer layout tag: {0}")]
    InvalidPointerLayout(u8),

    /// The file kind tag in a pointer header does not match the file it was read from
    #[error("Pointer file kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: u8, found: u8 },
}

/// Structural damage detected while opening or reading a store
#[derive(thiserror::Error, Debug)]
pub enum CorruptStoreError {
    /// A file holds fewer (or more) bytes than its metadata records
    ///
    /// # Fields
    /// * `path` - The offending file
    /// * `expected` - Number of bytes recorded in the metadata
    /// * `actual` - Number of bytes found on disk
    #[error("File {path:?} holds {actual} bytes but {expected} were expected - possibly truncated")]
    Truncated {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// An expected file of the store does not exist
    #[error("Expected file missing: {0:?}")]
    MissingFile(PathBuf),

    /// Pointer tables disagree with each other or with the index
    #[error("Pointer table inconsistency: {0}")]
    PointerTableInconsistent(String),

    /// A file does not match its trailing checksum
    #[error("Checksum mismatch in {path:?}: stored {stored:#018x}, computed {computed:#018x}")]
    FileChecksumMismatch {
        path: PathBuf,
        stored: u64,
        computed: u64,
    },

    /// A stored field ends before its declared size
    #[error("Unexpected end of {0}")]
    UnexpectedEnd(&'static str),

    /// A stored residue code lies outside the alphabet of the store
    #[error("Residue code {code} at sequence {id} is outside the alphabet ({codes} codes)")]
    InvalidResidue { id: u64, code: u8, codes: u8 },

    /// A stored quality value lies outside the representable range
    #[error("Quality value {value} at sequence {id} is outside the supported range")]
    InvalidQuality { id: u64, value: u8 },

    /// A stored name is not valid UTF-8
    #[error("Name of sequence {0} is not valid text")]
    InvalidName(u64),

    /// A compressed pointer payload could not be decoded
    #[error("Unable to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// A per-record checksum does not match the data loaded for it
    #[error("Checksum mismatch for sequence {0}")]
    RecordChecksumMismatch(u64),
}

/// Errors that can occur while reading sequence data
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The last call to `next_sequence()` or `seek()` failed and left current
    /// information unavailable
    #[error("Last call to nextSequence() or seek() failed and left current information unavailable.")]
    NoCurrentRecord,

    /// Attempted to access a record index that is beyond the available range
    ///
    /// # Fields
    /// * `id` - The requested record index
    /// * `count` - The number of records available
    #[error("Requested record index ({id}) is out of record range ({count})")]
    OutOfRange { id: u64, count: u64 },

    /// The caller-supplied buffer cannot hold the requested data
    #[error("Buffer too small: provided {provided} but {required} are required")]
    BufferTooSmall { provided: usize, required: usize },

    /// The requested load range is not valid for the store
    #[error("Invalid range [{start}, {end}) for a store of {count} sequences")]
    InvalidRange { start: u64, end: u64, count: u64 },

    /// A sub-sequence request lies outside the record
    #[error("Requested [{start}, {start}+{length}) of a sequence of length {sequence_length}")]
    SubsequenceOutOfRange {
        start: u64,
        length: u64,
        sequence_length: u64,
    },

    /// The requested data is not present in the store
    #[error("The store does not contain {0}")]
    Unavailable(&'static str),

    /// The operation requires a different alphabet
    #[error("Operation requires a {expected} store, found {found}")]
    UnsupportedSequenceType {
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors that can occur while writing sequence data
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// The configured maximum file size is outside the allowed bounds
    #[error("Size limit of {limit} is not within bounds of {min} and {max}")]
    SizeLimit { limit: u64, min: u64, max: u64 },

    /// The record is longer than any representable sequence
    #[error("Sequence length ({got}) exceeds the maximum ({max})")]
    SequenceTooLong { got: u64, max: u64 },

    /// The quality array does not match the residues
    #[error("Quality length ({quality}) does not match sequence length ({residues})")]
    QualityLengthMismatch { residues: usize, quality: usize },

    /// Quality was enabled for the store but the record carries none
    #[error("Store expects quality data but the record has none")]
    MissingQuality,

    /// A residue code is outside the alphabet and the policy rejects it
    ///
    /// # Fields
    /// * `code` - The offending residue code
    /// * `position` - Position of the residue within the record
    #[error("Residue code {code} at position {position} is outside the alphabet")]
    InvalidResidue { code: u8, position: usize },

    /// A sequence name contains characters that cannot be stored
    #[error("Invalid characters in sequence name: {0}")]
    InvalidName(String),

    /// The output path exists and is not a directory
    #[error("Output path is not a directory: {0:?}")]
    NotADirectory(PathBuf),
}

/// Errors raised by [`BitPackedArray`](crate::BitPackedArray)
#[derive(thiserror::Error, Debug)]
pub enum PackError {
    /// The value does not fit in the configured bit width
    #[error("Value {value} does not fit in {bits} bits")]
    ValueOutOfRange { value: u8, bits: u8 },

    /// The index lies beyond the number of elements
    #[error("Index {index} is out of bounds for {len} elements")]
    IndexOutOfBounds { index: u64, len: u64 },

    /// The bit width is not supported
    #[error("Unsupported bit width: {0}")]
    InvalidWidth(u8),

    /// The array cannot be addressed in memory
    #[error("Cannot pack {0} values")]
    TooLarge(u64),
}
