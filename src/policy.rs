use crate::{alphabet::SequenceType, error::WriteError, Result};

/// Policy for handling residue codes that fall outside the alphabet of a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResiduePolicy {
    /// Refuse the record; nothing of it is written
    #[default]
    Reject,
    /// Replace out-of-alphabet codes with the unknown code `0`
    SetToUnknown,
}
impl ResiduePolicy {
    /// Validate the residues according to the policy
    ///
    /// Returns `None` if every code is valid and the residues can be used as-is,
    /// otherwise fills `ibuf` with the corrected residues and returns it.
    /// Returns an error if the policy rejects invalid codes.
    ///
    /// # Arguments
    /// * `residues` - The residue codes to be checked
    /// * `ty` - The alphabet of the store
    /// * `ibuf` - The buffer to store the corrected residues
    pub fn handle<'a>(
        &self,
        residues: &[u8],
        ty: SequenceType,
        ibuf: &'a mut Vec<u8>,
    ) -> Result<Option<&'a [u8]>> {
        let Some(position) = residues.iter().position(|&c| !ty.is_valid_code(c)) else {
            return Ok(None);
        };
        match self {
            Self::Reject => Err(WriteError::InvalidResidue {
                code: residues[position],
                position,
            }
            .into()),
            Self::SetToUnknown => {
                ibuf.clear();
                ibuf.extend(
                    residues
                        .iter()
                        .map(|&c| if ty.is_valid_code(c) { c } else { 0 }),
                );
                Ok(Some(ibuf.as_slice()))
            }
        }
    }
}
