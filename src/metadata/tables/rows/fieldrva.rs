//! FieldRVA table (0x1D): fields with static initial data in the image.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the FieldRVA table (ECMA-335 II.22.18). Sorted by `field`.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRvaRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x1D??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// RVA of the field's initial data
    pub rva: u32,
    /// Field row owning the data
    pub field: u32,
}

impl RowReadable for FieldRvaRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(4 + sizes.table_index_bytes(TableId::Field))
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(FieldRvaRaw {
            rid,
            token: Token::from_parts(0x1D, rid),
            offset: *offset,
            rva: read_le_at::<u32>(data, offset)?,
            field: read_le_at_dyn(data, offset, sizes.is_large(TableId::Field))?,
        })
    }
}

impl RowWritable for FieldRvaRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.rva)?;
        write_le_at_dyn(data, offset, self.field, sizes.is_large(TableId::Field))?;
        Ok(())
    }
}
