//! Sequence names
//!
//! Names are split at the first whitespace into a label and a suffix (the suffix
//! keeps the whitespace). Labels are stored in the name file set, suffixes in the
//! suffix file set, and readers join them back for [`full_name`].
//!
//! [`full_name`]: crate::SequencesReader::full_name

use crate::error::{Result, WriteError};

/// Longest label that is stored; the excess moves into the suffix
pub const MAX_LABEL_LENGTH: usize = 240;

/// Number of warnings of one kind that are logged before they are suppressed
pub const MAX_WARNINGS: u64 = 10;

/// Prefix given to records without a name
pub const UNNAMED_PREFIX: &str = "Unnamed_sequence_";

const DISALLOWED_START: [u8; 3] = [b'*', b'=', b'@'];

/// Counts occurrences of one kind of warning, logging only the first few
#[derive(Debug, Clone, Copy)]
pub struct WarningCounter {
    kind: &'static str,
    count: u64,
}
impl WarningCounter {
    #[must_use]
    pub const fn new(kind: &'static str) -> Self {
        Self { kind, count: 0 }
    }

    /// Counts one occurrence and logs `detail` unless the cap was reached
    pub fn warn(&mut self, detail: &str) {
        if self.count < MAX_WARNINGS {
            log::warn!("{}: {detail}", self.kind);
        }
        self.count += 1;
        if self.count == MAX_WARNINGS {
            log::warn!("Subsequent warnings of type \"{}\" will not be shown", self.kind);
        }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Logs the total if any warning was counted
    pub fn summarize(&self) {
        if self.count > 0 {
            log::warn!("There were {} occurrences of \"{}\"", self.count, self.kind);
        }
    }
}

/// Label and suffix of a single name
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Label {
    pub label: String,
    pub suffix: String,
}

/// Splits, validates and repairs incoming names
#[derive(Debug, Clone)]
pub struct NameHandler {
    unnamed: WarningCounter,
    too_long: WarningCounter,
}
impl Default for NameHandler {
    fn default() -> Self {
        Self::new()
    }
}
impl NameHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            unnamed: WarningCounter::new("sequence without a name"),
            too_long: WarningCounter::new("sequence label too long"),
        }
    }

    /// Number of records that received a generated name
    #[must_use]
    pub fn unnamed(&self) -> u64 {
        self.unnamed.count()
    }

    /// Number of labels that were truncated
    #[must_use]
    pub fn truncated(&self) -> u64 {
        self.too_long.count()
    }

    pub fn summarize(&self) {
        self.unnamed.summarize();
        self.too_long.summarize();
    }

    /// Splits `name` into label and suffix
    ///
    /// Missing or empty labels are replaced with `Unnamed_sequence_<n>`, where `n`
    /// counts the unnamed records seen so far.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::InvalidName`] if the label contains characters outside
    /// printable ASCII or starts with `*`, `=` or `@`.
    pub fn handle(&mut self, name: Option<&str>) -> Result<Label> {
        let name = name.unwrap_or_default();
        let (label, suffix) = match name.find(char::is_whitespace) {
            Some(k) => name.split_at(k),
            None => (name, ""),
        };
        let mut label = if label.is_empty() {
            let mut translater = itoa::Buffer::new();
            let generated = format!(
                "{UNNAMED_PREFIX}{}",
                translater.format(self.unnamed.count())
            );
            self.unnamed.warn(&generated);
            generated
        } else {
            label.to_string()
        };
        let mut suffix = suffix.to_string();

        if !is_valid_label(label.as_bytes()) {
            return Err(WriteError::InvalidName(label).into());
        }

        // Labels are ASCII past validation so byte offsets are char boundaries
        if label.len() > MAX_LABEL_LENGTH {
            self.too_long.warn(&label);
            suffix.insert_str(0, &label[MAX_LABEL_LENGTH..]);
            label.truncate(MAX_LABEL_LENGTH);
        }
        Ok(Label { label, suffix })
    }
}

/// True if every byte is printable ASCII and the first is an allowed start
#[must_use]
pub fn is_valid_label(label: &[u8]) -> bool {
    match label.first() {
        None => true,
        Some(first) if DISALLOWED_START.contains(first) => false,
        Some(_) => label.iter().all(|b| (b'!'..=b'~').contains(b)),
    }
}

/// Contiguous storage for many short strings
#[derive(Debug, Clone, Default)]
pub struct NameArena {
    bytes: Vec<u8>,
    /// `offsets[i]..offsets[i + 1]` delimits entry `i`
    offsets: Vec<u64>,
    checksums: Vec<u8>,
}
impl NameArena {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            offsets: vec![0],
            checksums: Vec::new(),
        }
    }

    /// Appends a name that has already been validated as UTF-8
    pub fn push(&mut self, name: &[u8], checksum: u8) {
        self.bytes.extend_from_slice(name);
        self.offsets.push(self.bytes.len() as u64);
        self.checksums.push(checksum);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.checksums.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checksums.is_empty()
    }

    /// Returns entry `index`, if present
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        let start = *self.offsets.get(index)? as usize;
        let end = *self.offsets.get(index + 1)? as usize;
        std::str::from_utf8(&self.bytes[start..end]).ok()
    }

    #[must_use]
    pub fn checksum(&self, index: usize) -> Option<u8> {
        self.checksums.get(index).copied()
    }

    /// Approximate heap footprint in bytes
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes.len() + self.offsets.len() * 8 + self.checksums.len()
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn split_on_first_whitespace() -> Result<()> {
        let mut handler = NameHandler::new();
        let label = handler.handle(Some("read1 extra\tdata"))?;
        assert_eq!(label.label, "read1");
        assert_eq!(label.suffix, " extra\tdata");
        let label = handler.handle(Some("plain"))?;
        assert_eq!(label.suffix, "");
        Ok(())
    }

    #[test]
    fn unnamed_sequences_are_numbered() -> Result<()> {
        let mut handler = NameHandler::new();
        assert_eq!(handler.handle(None)?.label, "Unnamed_sequence_0");
        assert_eq!(handler.handle(Some(""))?.label, "Unnamed_sequence_1");
        let label = handler.handle(Some(" only suffix"))?;
        assert_eq!(label.label, "Unnamed_sequence_2");
        assert_eq!(label.suffix, " only suffix");
        assert_eq!(handler.unnamed(), 3);
        Ok(())
    }

    #[test]
    fn invalid_labels_are_rejected() {
        let mut handler = NameHandler::new();
        assert!(handler.handle(Some("*star")).is_err());
        assert!(handler.handle(Some("=eq")).is_err());
        assert!(handler.handle(Some("@at")).is_err());
        assert!(handler.handle(Some("caf\u{e9}")).is_err());
        assert!(handler.handle(Some("a*b=c@")).is_ok());
    }

    #[test]
    fn long_labels_are_truncated() -> Result<()> {
        let mut handler = NameHandler::new();
        let long = "x".repeat(MAX_LABEL_LENGTH + 5);
        let label = handler.handle(Some(&format!("{long} tail")))?;
        assert_eq!(label.label.len(), MAX_LABEL_LENGTH);
        assert_eq!(label.suffix, "xxxxx tail");
        assert_eq!(handler.truncated(), 1);
        Ok(())
    }

    #[test]
    fn arena_lookup() {
        let mut arena = NameArena::new();
        arena.push(b"alpha", 1);
        arena.push(b"", 2);
        arena.push(b"gamma", 3);
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.get(0), Some("alpha"));
        assert_eq!(arena.get(1), Some(""));
        assert_eq!(arena.get(2), Some("gamma"));
        assert_eq!(arena.get(3), None);
        assert_eq!(arena.checksum(2), Some(3));
    }
}
