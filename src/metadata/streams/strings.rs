//! String Heap (`#Strings`) read view.
//!
//! The `#Strings` heap stores the null-terminated UTF-8 identifier strings
//! referenced by metadata table columns. Offset 0 is always the empty string.
//!
//! # Reference
//! - [ECMA-335 II.24.2.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::ffi::CStr;

use crate::{Error::OutOfBounds, Result};

/// Read view over the `#Strings` heap.
///
/// Table columns store byte offsets into this heap; [`Strings::get`] decodes
/// the identifier at an offset without copying.
///
/// # Examples
///
/// ```rust
/// use cilforge::metadata::streams::Strings;
/// let data = &[0u8, b'H', b'e', b'l', b'l', b'o', 0u8];
/// let strings = Strings::from(data).unwrap();
/// assert_eq!(strings.get(1).unwrap(), "Hello");
/// assert_eq!(strings.get(0).unwrap(), "");
/// ```
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Create a `Strings` view from a byte slice.
    ///
    /// # Arguments
    /// * 'data' - The heap bytes; the first byte must be the reserved NUL
    ///
    /// # Errors
    /// Returns an error if the heap is empty or does not start with NUL
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Strings heap is invalid"));
        }

        Ok(Strings { data })
    }

    /// Decode the identifier starting at a heap offset.
    ///
    /// ## Arguments
    /// * 'index' - Byte offset within the heap (comes from table columns)
    ///
    /// # Errors
    /// Returns an error if the offset is out of bounds, unterminated, or the
    /// bytes are not valid UTF-8
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        match CStr::from_bytes_until_nul(&self.data[index..]) {
            Ok(value) => value
                .to_str()
                .map_err(|_| malformed_error!("Invalid string at index - {}", index)),
            Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
        }
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
        #[rustfmt::skip]
        let data: [u8; 24] = [
            0x00,
            b'<', b'M', b'o', b'd', b'u', b'l', b'e', b'>', 0x00,
            b'P', b'r', b'o', b'g', b'r', b'a', b'm', 0x00,
            b'M', b'a', b'i', b'n', 0x00,
            0x00,
        ];

        let strings = Strings::from(&data).unwrap();
        assert_eq!(strings.get(0).unwrap(), "");
        assert_eq!(strings.get(1).unwrap(), "<Module>");
        assert_eq!(strings.get(10).unwrap(), "Program");
        assert_eq!(strings.get(18).unwrap(), "Main");

        // Offsets into the middle of an entry are legal and yield a suffix
        assert_eq!(strings.get(12).unwrap(), "ogram");

        assert!(strings.get(500).is_err());
    }

    #[test]
    fn invalid() {
        assert!(Strings::from(&[]).is_err());
        assert!(Strings::from(&[b'x', 0x00]).is_err());
    }
}
