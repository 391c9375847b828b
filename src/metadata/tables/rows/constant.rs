//! Constant table (0x0B): compile-time default values.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the Constant table (ECMA-335 II.22.9). Sorted by `parent`.
///
/// `base_type` is the ELEMENT_TYPE of the value; the padding byte after it is
/// always zero on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x0B??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// ELEMENT_TYPE of the constant value
    pub base_type: u8,
    /// HasConstant coded index of the owning field, param or property
    pub parent: CodedIndex,
    /// `#Blob` offset of the value bytes
    pub value: u32,
}

impl RowReadable for ConstantRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* base_type + padding */ 2 +
            /* parent */              sizes.coded_index_bytes(CodedIndexType::HasConstant) +
            /* value */               sizes.blob_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        let base_type = read_le_at::<u8>(data, offset)?;
        let _padding = read_le_at::<u8>(data, offset)?;

        Ok(ConstantRaw {
            rid,
            token: Token::from_parts(0x0B, rid),
            offset: *offset,
            base_type,
            parent: CodedIndex::read(data, offset, sizes, CodedIndexType::HasConstant)?,
            value: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

impl RowWritable for ConstantRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u8>(data, offset, self.base_type)?;
        write_le_at::<u8>(data, offset, 0)?;
        self.parent
            .write(data, offset, sizes, CodedIndexType::HasConstant)?;
        write_le_at_dyn(data, offset, self.value, sizes.is_large_blob())?;
        Ok(())
    }
}
