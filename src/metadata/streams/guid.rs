//! GUID Heap (`#GUID`) read view.
//!
//! The `#GUID` heap is a flat sequence of 16 byte GUIDs addressed by 1-based
//! ordinal — most prominently the module MVID.
//!
//! # Reference
//! - [ECMA-335 II.24.2.5](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{Error::OutOfBounds, Result};

/// Read view over the `#GUID` heap.
///
/// # Examples
///
/// ```rust
/// use cilforge::metadata::streams::Guid;
/// let data = &[0u8; 16];
/// let guids = Guid::from(data).unwrap();
/// assert_eq!(guids.count(), 1);
/// assert_eq!(guids.get(1).unwrap(), uguid::Guid::ZERO);
/// ```
pub struct Guid<'a> {
    data: &'a [u8],
}

impl<'a> Guid<'a> {
    /// Create a `Guid` view from a byte slice.
    ///
    /// An empty heap is legal: images without a Module MVID ship no `#GUID`
    /// entries at all.
    ///
    /// # Arguments
    /// * 'data' - The heap bytes, a multiple of 16
    ///
    /// # Errors
    /// Returns an error if the heap size is not a multiple of 16
    pub fn from(data: &'a [u8]) -> Result<Guid<'a>> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "#GUID heap size {} is not a multiple of 16",
                data.len()
            ));
        }

        Ok(Guid { data })
    }

    /// Number of GUIDs in the heap
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.len() / 16
    }

    /// Return the GUID at a 1-based ordinal.
    ///
    /// ## Arguments
    /// * 'index' - The 1-based ordinal (comes from metadata tables)
    ///
    /// # Errors
    /// Returns an error if the ordinal is 0 or beyond the heap
    pub fn get(&self, index: usize) -> Result<uguid::Guid> {
        if index < 1 || index * 16 > self.data.len() {
            return Err(OutOfBounds);
        }

        let mut buffer = [0u8; 16];
        buffer.copy_from_slice(&self.data[(index - 1) * 16..index * 16]);

        Ok(uguid::Guid::from_bytes(buffer))
    }

    /// The raw heap bytes
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let mut data = [0u8; 32];
        data[16] = 0xAA; // second GUID starts with 0xAA

        let guids = Guid::from(&data).unwrap();
        assert_eq!(guids.count(), 2);
        assert_eq!(guids.get(1).unwrap(), uguid::Guid::ZERO);
        assert_eq!(guids.get(2).unwrap().to_bytes()[0], 0xAA);

        assert!(guids.get(0).is_err());
        assert!(guids.get(3).is_err());
    }

    #[test]
    fn invalid_size() {
        assert!(Guid::from(&[0u8; 15]).is_err());
        assert!(Guid::from(&[]).is_ok());
    }
}
