//! PropertyMap table (0x15): which types own which property ranges.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the PropertyMap table (ECMA-335 II.22.35).
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyMapRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x15??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// TypeDef row owning the properties
    pub parent: u32,
    /// First owned row in the Property table
    pub property_list: u32,
}

impl RowReadable for PropertyMapRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            sizes.table_index_bytes(TableId::TypeDef)
                + sizes.table_index_bytes(TableId::Property),
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(PropertyMapRaw {
            rid,
            token: Token::from_parts(0x15, rid),
            offset: *offset,
            parent: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            property_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Property))?,
        })
    }
}

impl RowWritable for PropertyMapRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(data, offset, self.parent, sizes.is_large(TableId::TypeDef))?;
        write_le_at_dyn(
            data,
            offset,
            self.property_list,
            sizes.is_large(TableId::Property),
        )?;
        Ok(())
    }
}
