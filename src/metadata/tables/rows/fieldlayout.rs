//! FieldLayout table (0x10): explicit field offsets.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the FieldLayout table (ECMA-335 II.22.16). Sorted by `field`.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldLayoutRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x10??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// Byte offset of the field inside its explicit-layout type
    pub field_offset: u32,
    /// Field row being positioned
    pub field: u32,
}

impl RowReadable for FieldLayoutRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(4 + sizes.table_index_bytes(TableId::Field))
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(FieldLayoutRaw {
            rid,
            token: Token::from_parts(0x10, rid),
            offset: *offset,
            field_offset: read_le_at::<u32>(data, offset)?,
            field: read_le_at_dyn(data, offset, sizes.is_large(TableId::Field))?,
        })
    }
}

impl RowWritable for FieldLayoutRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.field_offset)?;
        write_le_at_dyn(data, offset, self.field, sizes.is_large(TableId::Field))?;
        Ok(())
    }
}
