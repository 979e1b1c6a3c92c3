//! Fixed-width bit-packed storage
//!
//! [`BitPackedArray`] stores small unsigned values (1 to 8 bits each) back to back in
//! a buffer of `u64` words. A value may straddle two words. The array is built by a
//! single writer (via [`BitPackedArray::push`] or [`BitPackedArray::set`]) and is only
//! read afterwards.

use crate::error::{PackError, Result};

/// Largest supported bit width
pub const MAX_BITS: u8 = 8;

const WORD_BITS: u64 = u64::BITS as u64;

/// Array of fixed-width unsigned values packed into `u64` words
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitPackedArray {
    /// Backing words
    words: Vec<u64>,

    /// Number of bits per value
    bits: u8,

    /// Number of values
    len: u64,
}
impl BitPackedArray {
    /// Creates an array of `len` zero values of `bits` width
    ///
    /// # Arguments
    /// * `len` - The number of elements
    /// * `bits` - The width of every element in bits (1 to 8)
    pub fn new(len: u64, bits: u8) -> Result<Self> {
        Self::validate_width(bits)?;
        Ok(Self {
            words: vec![0; Self::words_for(len, bits)?],
            bits,
            len,
        })
    }

    /// Creates an empty array with room for `capacity` values
    pub fn with_capacity(bits: u8, capacity: u64) -> Result<Self> {
        Self::validate_width(bits)?;
        Ok(Self {
            words: Vec::with_capacity(Self::words_for(capacity, bits)?),
            bits,
            len: 0,
        })
    }

    fn validate_width(bits: u8) -> Result<()> {
        if bits == 0 || bits > MAX_BITS {
            return Err(PackError::InvalidWidth(bits).into());
        }
        Ok(())
    }

    fn words_for(len: u64, bits: u8) -> Result<usize> {
        len.checked_mul(u64::from(bits))
            .and_then(|total| usize::try_from(total.div_ceil(WORD_BITS)).ok())
            .ok_or(PackError::TooLarge(len).into())
    }

    fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }

    /// Number of values held
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Width of every value in bits
    #[must_use]
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Number of values the array holds without reallocating
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.words.capacity() as u64 * WORD_BITS / u64::from(self.bits.max(1))
    }

    /// Approximate heap footprint in bytes
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<u64>()
    }

    fn check_value(&self, value: u8) -> Result<()> {
        if u64::from(value) > self.mask() {
            return Err(PackError::ValueOutOfRange {
                value,
                bits: self.bits,
            }
            .into());
        }
        Ok(())
    }

    fn check_index(&self, index: u64) -> Result<()> {
        if index >= self.len {
            return Err(PackError::IndexOutOfBounds {
                index,
                len: self.len,
            }
            .into());
        }
        Ok(())
    }

    /// Returns the value at `index`
    pub fn get(&self, index: u64) -> Result<u8> {
        self.check_index(index)?;
        Ok(self.value_at(index))
    }

    /// Stores `value` at `index`
    ///
    /// Values that do not fit in the configured width are rejected, never masked.
    pub fn set(&mut self, index: u64, value: u8) -> Result<()> {
        self.check_index(index)?;
        self.check_value(value)?;
        self.store(index, value);
        Ok(())
    }

    /// Appends `value` to the end of the array
    pub fn push(&mut self, value: u8) -> Result<()> {
        self.check_value(value)?;
        let index = self.len;
        let required = Self::words_for(index + 1, self.bits)?;
        if self.words.len() < required {
            self.words.resize(required, 0);
        }
        self.len += 1;
        self.store(index, value);
        Ok(())
    }

    /// Appends every value of `values`
    ///
    /// Validates all values before modifying the array.
    pub fn extend_from_slice(&mut self, values: &[u8]) -> Result<()> {
        if let Some(&bad) = values.iter().find(|&&v| u64::from(v) > self.mask()) {
            return Err(PackError::ValueOutOfRange {
                value: bad,
                bits: self.bits,
            }
            .into());
        }
        let start = self.len;
        let len = start
            .checked_add(values.len() as u64)
            .ok_or(PackError::TooLarge(u64::MAX))?;
        self.words.resize(Self::words_for(len, self.bits)?, 0);
        self.len = len;
        for (i, &v) in values.iter().enumerate() {
            self.store(start + i as u64, v);
        }
        Ok(())
    }

    /// Decodes `out.len()` values starting at `start` into `out`
    pub fn copy_range(&self, start: u64, out: &mut [u8]) -> Result<()> {
        let end = start.saturating_add(out.len() as u64);
        if end > self.len {
            return Err(PackError::IndexOutOfBounds {
                index: end - 1,
                len: self.len,
            }
            .into());
        }
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.value_at(start + i as u64);
        }
        Ok(())
    }

    fn value_at(&self, index: u64) -> u8 {
        let bit = index * u64::from(self.bits);
        let word = (bit / WORD_BITS) as usize;
        let offset = bit % WORD_BITS;
        let mut value = self.words[word] >> offset;
        if offset + u64::from(self.bits) > WORD_BITS {
            value |= self.words[word + 1] << (WORD_BITS - offset);
        }
        (value & self.mask()) as u8
    }

    fn store(&mut self, index: u64, value: u8) {
        let mask = self.mask();
        let value = u64::from(value);
        let bit = index * u64::from(self.bits);
        let word = (bit / WORD_BITS) as usize;
        let offset = bit % WORD_BITS;
        self.words[word] = (self.words[word] & !(mask << offset)) | (value << offset);
        if offset + u64::from(self.bits) > WORD_BITS {
            let shift = WORD_BITS - offset;
            self.words[word + 1] = (self.words[word + 1] & !(mask >> shift)) | (value >> shift);
        }
    }
}
