//! Rolling file sets
//!
//! Each kind of per-record data (residues, quality, name labels, name suffixes)
//! is written into its own sequence of size-capped files. A record's bytes fill
//! the current file up to the cap and continue at offset 0 of the next file, so a
//! record may span several files.
//!
//! For every data file `{prefix}data{n}` there is a pointer file
//! `{prefix}pointer{n}` holding a [`PointerTable`] for the records that *start* in
//! it, and every kind carries one [`RollingIndex`] (`{prefix}index`) listing the
//! number of records and bytes of each file.

mod file_index;
mod pointer;
mod set;
mod writer;

pub use file_index::{RollingIndex, RollingIndexEntry, ROLLING_MAGIC, SIZE_ROLLING_HEADER};
pub use pointer::{
    PointerEntry, PointerHeader, PointerLayout, PointerTable, POINTER_MAGIC, SIZE_POINTER_HEADER,
};
pub use set::RollingSet;
pub use writer::RollingWriter;

use std::path::{Path, PathBuf};

use crate::error::{FormatError, Result};

/// Format version shared by pointer files and rolling indices
pub const ROLLING_FORMAT: u8 = 1;

/// The kinds of rolling file sets in a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Residue codes, one byte per residue
    Sequence,
    /// Quality values, one byte per residue
    Quality,
    /// Name labels
    Name,
    /// Name suffixes
    Suffix,
}
impl FileKind {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Sequence => "seq",
            Self::Quality => "qual",
            Self::Name => "name",
            Self::Suffix => "suffix",
        }
    }

    /// Tag stored in pointer and index headers
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Sequence => 0,
            Self::Quality => 1,
            Self::Name => 2,
            Self::Suffix => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Sequence),
            1 => Ok(Self::Quality),
            2 => Ok(Self::Name),
            3 => Ok(Self::Suffix),
            x => Err(FormatError::KindMismatch {
                expected: 0,
                found: x,
            }
            .into()),
        }
    }

    /// Path of the `n`-th data file
    #[must_use]
    pub fn data_path(self, dir: &Path, n: usize) -> PathBuf {
        dir.join(format!("{}data{n}", self.prefix()))
    }

    /// Path of the `n`-th pointer file
    #[must_use]
    pub fn pointer_path(self, dir: &Path, n: usize) -> PathBuf {
        dir.join(format!("{}pointer{n}", self.prefix()))
    }

    /// Path of the rolling index of this kind
    #[must_use]
    pub fn index_path(self, dir: &Path) -> PathBuf {
        dir.join(format!("{}index", self.prefix()))
    }

    /// Checks a tag read from a header against this kind
    pub fn expect_tag(self, found: u8) -> Result<()> {
        if found != self.tag() {
            return Err(FormatError::KindMismatch {
                expected: self.tag(),
                found,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn file_names() {
        let dir = Path::new("/store");
        assert_eq!(
            FileKind::Sequence.data_path(dir, 3),
            PathBuf::from("/store/seqdata3")
        );
        assert_eq!(
            FileKind::Quality.pointer_path(dir, 0),
            PathBuf::from("/store/qualpointer0")
        );
        assert_eq!(
            FileKind::Suffix.index_path(dir),
            PathBuf::from("/store/suffixindex")
        );
    }

    #[test]
    fn tags() -> Result<()> {
        for kind in [
            FileKind::Sequence,
            FileKind::Quality,
            FileKind::Name,
            FileKind::Suffix,
        ] {
            assert_eq!(FileKind::from_tag(kind.tag())?, kind);
            kind.expect_tag(kind.tag())?;
        }
        assert!(FileKind::Name.expect_tag(0).is_err());
        assert!(FileKind::from_tag(9).is_err());
        Ok(())
    }
}
