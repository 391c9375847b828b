//! ClassLayout table (0x0F): explicit packing and size of types.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the ClassLayout table (ECMA-335 II.22.8). Sorted by `parent`.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassLayoutRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x0F??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// Field packing alignment, a power of two up to 128
    pub packing_size: u16,
    /// Explicit byte size of the type, 0 when unconstrained
    pub class_size: u32,
    /// TypeDef row of the laid out type
    pub parent: u32,
}

impl RowReadable for ClassLayoutRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(2 + 4 + sizes.table_index_bytes(TableId::TypeDef))
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ClassLayoutRaw {
            rid,
            token: Token::from_parts(0x0F, rid),
            offset: *offset,
            packing_size: read_le_at::<u16>(data, offset)?,
            class_size: read_le_at::<u32>(data, offset)?,
            parent: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
        })
    }
}

impl RowWritable for ClassLayoutRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u16>(data, offset, self.packing_size)?;
        write_le_at::<u32>(data, offset, self.class_size)?;
        write_le_at_dyn(data, offset, self.parent, sizes.is_large(TableId::TypeDef))?;
        Ok(())
    }
}
