//! Table row counts and index width bookkeeping.
//!
//! [`TableInfo`] answers the sizing questions every row codec asks: how many
//! rows a table has, whether simple indexes into it take 2 or 4 bytes, how
//! wide each coded index space is, and how wide the heap index columns are.
//! On the read path it is populated from the `#~` header; on the write path
//! the build pipeline constructs it after all rows and heap bytes are final.

use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::read_le_at,
    metadata::tables::{CodedIndexType, TableId},
    Error::OutOfBounds,
    Result,
};

/// Row count and index sizing for one table.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// The count of rows in this table
    pub rows: u32,
    /// Number of bits required to represent any valid row index
    pub bits: u8,
    /// True when indexes into this table take 4 bytes instead of 2
    pub is_large: bool,
}

impl TableRowInfo {
    /// Create sizing information for a table with `rows` rows.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            (32 - rows.leading_zeros()) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// Row counts and index widths of all tables in one image or build.
///
/// Once constructed it never changes: the spec freezes index widths at
/// header time for loads and after sizing for builds.
#[derive(Clone, Default)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_index_bits: Vec<u8>,
    large_str: bool,
    large_guid: bool,
    large_blob: bool,
}

/// Cheap-copy reference to a [`TableInfo`]
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Parse sizing information from a `#~` stream header.
    ///
    /// ## Arguments
    /// * 'data' - The `#~` stream, from its first byte
    /// * 'valid_bitvec' - The header's `valid` mask of present tables
    ///
    /// # Errors
    /// Returns an error when the row count array is truncated
    pub fn parse(data: &[u8], valid_bitvec: u64) -> Result<Self> {
        let mut rows = vec![TableRowInfo::default(); TableId::LAST as usize + 1];
        let mut cursor = 24;

        for bit in 0..64u64 {
            if (valid_bitvec & (1 << bit)) == 0 {
                continue;
            }

            if data.len() < cursor {
                return Err(OutOfBounds);
            }

            let row_count = read_le_at::<u32>(data, &mut cursor)?;
            let Some(table_id) = u8::try_from(bit).ok().and_then(TableId::from_u8) else {
                // Bits above 0x2C would be PDB-era tables; this engine
                // handles the ECMA-335 v2.0 layout only.
                return Err(malformed_error!(
                    "Unsupported table id {} present in image",
                    bit
                ));
            };

            if row_count == 0 {
                continue;
            }
            rows[table_id as usize] = TableRowInfo::new(row_count);
        }

        let heap_size_flags = data.get(6).copied().ok_or(OutOfBounds)?;
        let mut info = TableInfo {
            rows,
            coded_index_bits: vec![0; CodedIndexType::COUNT],
            large_str: heap_size_flags & 0x01 != 0,
            large_guid: heap_size_flags & 0x02 != 0,
            large_blob: heap_size_flags & 0x04 != 0,
        };

        info.calculate_coded_index_bits();
        Ok(info)
    }

    /// Build sizing information from explicit row counts, for the write
    /// pipeline and for tests.
    ///
    /// ## Arguments
    /// * 'counts' - `(table, row_count)` pairs of the non-empty tables
    /// * 'large_str' / 'large_blob' / 'large_guid' - heap index widths
    #[must_use]
    pub fn from_counts(
        counts: &[(TableId, u32)],
        large_str: bool,
        large_blob: bool,
        large_guid: bool,
    ) -> Self {
        let mut info = TableInfo {
            rows: vec![TableRowInfo::default(); TableId::LAST as usize + 1],
            coded_index_bits: vec![0; CodedIndexType::COUNT],
            large_str,
            large_guid,
            large_blob,
        };

        for (table, count) in counts {
            info.rows[*table as usize] = TableRowInfo::new(*count);
        }

        info.calculate_coded_index_bits();
        info
    }

    /// True when simple indexes into `id` take 4 bytes
    #[must_use]
    pub fn is_large(&self, id: TableId) -> bool {
        self.rows[id as usize].is_large
    }

    /// True when `#Strings` indexes take 4 bytes
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.large_str
    }

    /// True when `#GUID` indexes take 4 bytes
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.large_guid
    }

    /// True when `#Blob` indexes take 4 bytes
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.large_blob
    }

    /// Byte width of a `#Strings` index column
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.large_str {
            4
        } else {
            2
        }
    }

    /// Byte width of a `#GUID` index column
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.large_guid {
            4
        } else {
            2
        }
    }

    /// Byte width of a `#Blob` index column
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.large_blob {
            4
        } else {
            2
        }
    }

    /// Sizing information for one table
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Bits required to index `table_id`
    #[must_use]
    pub fn table_index_bits(&self, table_id: TableId) -> u8 {
        self.rows[table_id as usize].bits
    }

    /// Byte width of a simple index column into `table_id`
    #[must_use]
    pub fn table_index_bytes(&self, table_id: TableId) -> u8 {
        if self.rows[table_id as usize].is_large {
            4
        } else {
            2
        }
    }

    /// Bits required for one coded index space
    #[must_use]
    pub fn coded_index_bits(&self, coded_index_type: CodedIndexType) -> u8 {
        self.coded_index_bits[coded_index_type as usize]
    }

    /// Byte width of a coded index column of one space
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index_type: CodedIndexType) -> u8 {
        if self.coded_index_bits[coded_index_type as usize] > 16 {
            4
        } else {
            2
        }
    }

    /// Decode a coded index value into `(table, row)`.
    ///
    /// ## Arguments
    /// * 'value' - The encoded value
    /// * 'coded_index_type' - The space to decode in
    ///
    /// # Errors
    /// Returns an error when the tag selects no table of the space
    pub fn decode_coded_index(
        &self,
        value: u32,
        coded_index_type: CodedIndexType,
    ) -> Result<(TableId, u32)> {
        let tables = coded_index_type.tables();
        let tag_bits = coded_index_type.tag_bits();
        let tag = value & ((1 << tag_bits) - 1);
        let index = value >> tag_bits;

        if tag as usize >= tables.len() {
            return Err(OutOfBounds);
        }

        Ok((tables[tag as usize], index))
    }

    fn calculate_coded_index_bits(&mut self) {
        for coded_index in CodedIndexType::iter() {
            let max_bits = coded_index
                .tables()
                .iter()
                .map(|table| self.table_index_bits(*table))
                .max()
                .unwrap_or(1);

            self.coded_index_bits[coded_index as usize] = max_bits + coded_index.tag_bits();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_info_bits() {
        assert_eq!(TableRowInfo::new(0).bits, 1);
        assert_eq!(TableRowInfo::new(1).bits, 1);
        assert_eq!(TableRowInfo::new(2).bits, 2);
        assert_eq!(TableRowInfo::new(0xFFFF).bits, 16);
        assert!(!TableRowInfo::new(0xFFFF).is_large);
        assert!(TableRowInfo::new(0x1_0000).is_large);
    }

    #[test]
    fn simple_index_widths() {
        let info = TableInfo::from_counts(
            &[(TableId::TypeDef, 10), (TableId::MethodDef, 0x1_0000)],
            false,
            false,
            false,
        );

        assert_eq!(info.table_index_bytes(TableId::TypeDef), 2);
        assert_eq!(info.table_index_bytes(TableId::MethodDef), 4);
        assert_eq!(info.table_index_bytes(TableId::Field), 2);
    }

    #[test]
    fn coded_index_widths() {
        // TypeDefOrRef has 2 tag bits; 0x4000 rows in TypeDef need 15 bits,
        // 15 + 2 > 16 forces the wide form.
        let narrow = TableInfo::from_counts(&[(TableId::TypeDef, 0x3FFF)], false, false, false);
        assert_eq!(narrow.coded_index_bytes(CodedIndexType::TypeDefOrRef), 2);

        let wide = TableInfo::from_counts(&[(TableId::TypeDef, 0x4000)], false, false, false);
        assert_eq!(wide.coded_index_bytes(CodedIndexType::TypeDefOrRef), 4);
    }

    #[test]
    fn decode() {
        let info = TableInfo::from_counts(&[(TableId::TypeDef, 10)], false, false, false);

        // (5 << 2) | 1 -> TypeRef row 5
        let (table, row) = info
            .decode_coded_index(0x15, CodedIndexType::TypeDefOrRef)
            .unwrap();
        assert_eq!(table, TableId::TypeRef);
        assert_eq!(row, 5);

        // Tag 3 does not exist in TypeDefOrRef
        assert!(info
            .decode_coded_index(0x03, CodedIndexType::TypeDefOrRef)
            .is_err());
    }
}
