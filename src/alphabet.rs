//! Residue alphabets
//!
//! Residues are stored as small integer codes. Codes below
//! [`SequenceType::first_valid`] denote unknown residues (`N` for DNA, `X` and
//! `*` for protein) and feed the unknown-block statistics.

use crate::error::{FormatError, Result};

/// Number of slots in every per-residue counting array.
///
/// This is the largest alphabet a 5-bit code can express; entries past the
/// alphabet of a store are always zero.
pub const MAX_CODES: usize = 32;

const DNA_SYMBOLS: &[u8; 5] = b"NACGT";
const PROTEIN_SYMBOLS: &[u8; 22] = b"X*ARNDCQEGHILKMFPSTWYV";

/// Alphabet of the residues held in a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SequenceType {
    /// Nucleotides: `N=0 A=1 C=2 G=3 T=4`
    #[default]
    Dna,
    /// Amino acids: `X=0 *=1` followed by the twenty standard residues
    Protein,
}
impl SequenceType {
    /// Number of distinct residue codes
    #[must_use]
    pub const fn num_codes(self) -> u8 {
        match self {
            Self::Dna => DNA_SYMBOLS.len() as u8,
            Self::Protein => PROTEIN_SYMBOLS.len() as u8,
        }
    }

    /// First code that denotes a known residue
    #[must_use]
    pub const fn first_valid(self) -> u8 {
        match self {
            Self::Dna => 1,
            Self::Protein => 2,
        }
    }

    /// Bits required to pack one residue code
    #[must_use]
    pub fn bits(self) -> u8 {
        bits_for(u32::from(self.num_codes()))
    }

    /// Tag written to the index file
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Dna => 0,
            Self::Protein => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Dna),
            1 => Ok(Self::Protein),
            x => Err(FormatError::InvalidSequenceType(x).into()),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dna => "DNA",
            Self::Protein => "PROTEIN",
        }
    }

    fn symbols(self) -> &'static [u8] {
        match self {
            Self::Dna => DNA_SYMBOLS,
            Self::Protein => PROTEIN_SYMBOLS,
        }
    }

    /// True if `code` is a code of this alphabet
    #[must_use]
    pub fn is_valid_code(self, code: u8) -> bool {
        code < self.num_codes()
    }

    /// True if `code` denotes an unknown residue
    #[must_use]
    pub fn is_unknown(self, code: u8) -> bool {
        code < self.first_valid()
    }

    /// Converts one ASCII residue to its code. Unrecognised characters map to
    /// the unknown code `0`.
    #[must_use]
    pub fn encode_residue(self, residue: u8) -> u8 {
        let upper = residue.to_ascii_uppercase();
        match self {
            Self::Dna => match upper {
                b'A' => 1,
                b'C' => 2,
                b'G' => 3,
                b'T' | b'U' => 4,
                _ => 0,
            },
            Self::Protein => self
                .symbols()
                .iter()
                .position(|&s| s == upper)
                .map_or(0, |p| p as u8),
        }
    }

    /// Converts ASCII residues to codes, appending to `out`
    pub fn encode_ascii(self, residues: &[u8], out: &mut Vec<u8>) {
        out.extend(residues.iter().map(|&r| self.encode_residue(r)));
    }

    /// Converts a code back to its ASCII residue. Codes outside the alphabet
    /// decode to the unknown symbol.
    #[must_use]
    pub fn decode_code(self, code: u8) -> u8 {
        let symbols = self.symbols();
        symbols
            .get(usize::from(code))
            .copied()
            .unwrap_or(symbols[0])
    }

    /// Converts codes back to ASCII residues, appending to `out`
    pub fn decode_codes(self, codes: &[u8], out: &mut Vec<u8>) {
        out.extend(codes.iter().map(|&c| self.decode_code(c)));
    }
}

/// Complement of a DNA code (`N` maps to itself)
#[must_use]
pub const fn complement_dna(code: u8) -> u8 {
    match code {
        1 => 4,
        2 => 3,
        3 => 2,
        4 => 1,
        x => x,
    }
}

/// Minimum number of bits needed to represent `n` distinct symbols (at least 1)
#[must_use]
pub fn bits_for(n: u32) -> u8 {
    if n <= 2 {
        return 1;
    }
    (32 - (n - 1).leading_zeros()) as u8
}
