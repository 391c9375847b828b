//! Interning builders for the four metadata heaps.
//!
//! Each builder is append-only and content-addressed: interning the same
//! value twice yields the same index, interning never invalidates an index
//! already handed out. Offsets are final the moment they are returned, which
//! is what lets the build pipeline hand out tokens during contribution and
//! freeze widths afterwards.
//!
//! Heap index widths follow the final byte size: a heap at 2^16 bytes or
//! beyond switches its index columns to 4 bytes via the `heapSizes` flags.

use rustc_hash::FxHashMap;

use crate::{file::io::write_compressed_uint, Result};

/// Builder for the `#Strings` heap: null-terminated UTF-8 identifiers.
pub struct StringsBuilder {
    data: Vec<u8>,
    map: FxHashMap<String, u32>,
}

impl Default for StringsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StringsBuilder {
    /// Create a heap holding only the reserved empty string at offset 0
    #[must_use]
    pub fn new() -> Self {
        StringsBuilder {
            data: vec![0],
            map: FxHashMap::default(),
        }
    }

    /// Intern an identifier, returning its heap offset.
    ///
    /// The empty string is always offset 0; repeated values return their
    /// first offset.
    pub fn intern(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }
        if let Some(&existing) = self.map.get(value) {
            return existing;
        }

        #[allow(clippy::cast_possible_truncation)]
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.map.insert(value.to_string(), offset);
        offset
    }

    /// Current heap size in bytes, before alignment
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when only the reserved NUL has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    }

    /// True when string index columns need 4 bytes
    #[must_use]
    pub fn is_large(&self) -> bool {
        aligned_len(&self.data) >= 0x1_0000
    }

    /// The heap bytes, padded to a 4 byte boundary
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        align(self.data)
    }
}

/// Builder for the `#US` heap: length-prefixed UTF-16 string literals.
pub struct UserStringsBuilder {
    data: Vec<u8>,
    map: FxHashMap<String, u32>,
}

impl Default for UserStringsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStringsBuilder {
    /// Create a heap holding only the reserved NUL entry at offset 0
    #[must_use]
    pub fn new() -> Self {
        UserStringsBuilder {
            data: vec![0],
            map: FxHashMap::default(),
        }
    }

    /// Adopt an existing `#US` heap byte-for-byte.
    ///
    /// `ldstr` tokens embed heap offsets, so a rebuilt image must keep every
    /// existing entry at its original offset; this seeds the heap with the
    /// loaded bytes and reconstructs the dedup map over them. New literals
    /// append after the existing data.
    ///
    /// # Errors
    /// Returns an error when the heap does not start with the reserved NUL
    pub fn from_existing(data: &[u8]) -> Result<Self> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #US heap is invalid"));
        }

        let mut map = FxHashMap::default();
        let view = crate::metadata::streams::UserStrings::from(data)?;
        for (offset, value) in view.iter() {
            #[allow(clippy::cast_possible_truncation)]
            map.entry(value.to_string_lossy())
                .or_insert(offset as u32);
        }

        Ok(UserStringsBuilder {
            data: data.to_vec(),
            map,
        })
    }

    /// Intern a string literal, returning its heap offset.
    ///
    /// The entry is the compressed byte length, the UTF-16LE code units and
    /// a terminal byte flagging strings with characters beyond simple ASCII.
    ///
    /// # Errors
    /// Returns an error for literals whose encoded size leaves the
    /// compressed-length range.
    pub fn intern(&mut self, value: &str) -> Result<u32> {
        if let Some(&existing) = self.map.get(value) {
            return Ok(existing);
        }

        #[allow(clippy::cast_possible_truncation)]
        let offset = self.data.len() as u32;

        let utf16_bytes: Vec<u8> = value.encode_utf16().flat_map(u16::to_le_bytes).collect();
        let total_length = u32::try_from(utf16_bytes.len() + 1)
            .map_err(|_| malformed_error!("User string is too long for the #US heap"))?;

        write_compressed_uint(total_length, &mut self.data)?;
        self.data.extend_from_slice(&utf16_bytes);

        let has_special = value.chars().any(|c| c as u32 >= 0x80);
        self.data.push(u8::from(has_special));

        self.map.insert(value.to_string(), offset);
        Ok(offset)
    }

    /// Current heap size in bytes, before alignment
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when only the reserved NUL has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    }

    /// The heap bytes, padded to a 4 byte boundary
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        align(self.data)
    }
}

/// Builder for the `#Blob` heap: length-prefixed opaque byte strings.
pub struct BlobBuilder {
    data: Vec<u8>,
    map: FxHashMap<Vec<u8>, u32>,
}

impl Default for BlobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobBuilder {
    /// Create a heap holding only the reserved empty blob at offset 0
    #[must_use]
    pub fn new() -> Self {
        BlobBuilder {
            data: vec![0],
            map: FxHashMap::default(),
        }
    }

    /// Intern a byte string, returning its heap offset.
    ///
    /// The empty blob is always offset 0.
    ///
    /// # Errors
    /// Returns an error for blobs whose size leaves the compressed-length
    /// range.
    pub fn intern(&mut self, value: &[u8]) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }
        if let Some(&existing) = self.map.get(value) {
            return Ok(existing);
        }

        #[allow(clippy::cast_possible_truncation)]
        let offset = self.data.len() as u32;
        let length = u32::try_from(value.len())
            .map_err(|_| malformed_error!("Blob is too long for the #Blob heap"))?;

        write_compressed_uint(length, &mut self.data)?;
        self.data.extend_from_slice(value);
        self.map.insert(value.to_vec(), offset);
        Ok(offset)
    }

    /// Current heap size in bytes, before alignment
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when only the reserved empty blob has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    }

    /// True when blob index columns need 4 bytes
    #[must_use]
    pub fn is_large(&self) -> bool {
        aligned_len(&self.data) >= 0x1_0000
    }

    /// The heap bytes, padded to a 4 byte boundary
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        align(self.data)
    }
}

/// Builder for the `#GUID` heap: 16 byte entries addressed by 1-based
/// ordinal.
#[derive(Default)]
pub struct GuidBuilder {
    data: Vec<u8>,
    map: FxHashMap<[u8; 16], u32>,
}

impl GuidBuilder {
    /// Create an empty heap
    #[must_use]
    pub fn new() -> Self {
        GuidBuilder::default()
    }

    /// Intern a GUID, returning its 1-based ordinal
    pub fn intern(&mut self, value: uguid::Guid) -> u32 {
        let bytes = value.to_bytes();
        if let Some(&existing) = self.map.get(&bytes) {
            return existing;
        }

        self.data.extend_from_slice(&bytes);
        #[allow(clippy::cast_possible_truncation)]
        let ordinal = (self.data.len() / 16) as u32;
        self.map.insert(bytes, ordinal);
        ordinal
    }

    /// Current heap size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no GUID has been interned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when GUID index columns need 4 bytes
    #[must_use]
    pub fn is_large(&self) -> bool {
        self.data.len() >= 0x1_0000
    }

    /// The heap bytes; GUID entries are inherently 4 byte aligned
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

fn aligned_len(data: &[u8]) -> usize {
    (data.len() + 3) & !3
}

fn align(mut data: Vec<u8>) -> Vec<u8> {
    let target = aligned_len(&data);
    data.resize(target, 0);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_intern_is_idempotent() {
        let mut heap = StringsBuilder::new();
        assert_eq!(heap.intern(""), 0);
        let first = heap.intern("Program");
        let second = heap.intern("Main");
        assert_eq!(heap.intern("Program"), first);
        assert_eq!(heap.intern("Main"), second);
        assert_eq!(first, 1);
        assert_eq!(second, 1 + "Program".len() as u32 + 1);

        let bytes = heap.into_bytes();
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(&bytes[1..8], b"Program");
        assert_eq!(bytes[8], 0);
    }

    #[test]
    fn userstrings_entry_layout() {
        let mut heap = UserStringsBuilder::new();
        let offset = heap.intern("hi").unwrap();
        assert_eq!(offset, 1);
        assert_eq!(heap.intern("hi").unwrap(), 1);

        let bytes = heap.into_bytes();
        // length 5 = two UTF-16 units + flag byte; flag 0 for pure ASCII
        assert_eq!(&bytes[..7], &[0x00, 0x05, b'h', 0x00, b'i', 0x00, 0x00]);
    }

    #[test]
    fn userstrings_special_flag() {
        let mut heap = UserStringsBuilder::new();
        heap.intern("é").unwrap();
        let bytes = heap.into_bytes();
        // one UTF-16 unit, flag byte 1
        assert_eq!(bytes[1], 0x03);
        assert_eq!(bytes[4], 0x01);
    }

    #[test]
    fn blobs_dedup_by_content() {
        let mut heap = BlobBuilder::new();
        assert_eq!(heap.intern(&[]).unwrap(), 0);
        let sig = heap.intern(&[0x06, 0x08]).unwrap();
        assert_eq!(heap.intern(&[0x06, 0x08]).unwrap(), sig);
        assert_ne!(heap.intern(&[0x06, 0x0E]).unwrap(), sig);
    }

    #[test]
    fn guids_are_ordinals() {
        let mut heap = GuidBuilder::new();
        let nil = heap.intern(uguid::Guid::ZERO);
        assert_eq!(nil, 1);
        assert_eq!(heap.intern(uguid::Guid::ZERO), 1);

        let other = heap.intern(uguid::guid!("01020304-0506-0708-090a-0b0c0d0e0f10"));
        assert_eq!(other, 2);
        assert_eq!(heap.len(), 32);
    }

    #[test]
    fn large_heap_flips_width() {
        let mut heap = StringsBuilder::new();
        assert!(!heap.is_large());

        // Drive the heap past 2^16 bytes with distinct strings
        let mut index = 0u32;
        while heap.len() < 0x1_0000 {
            heap.intern(&format!("string_padding_payload_{index:08}"));
            index += 1;
        }
        assert!(heap.is_large());
    }
}
