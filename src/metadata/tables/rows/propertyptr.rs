//! PropertyPtr table (0x16): indirection layer of uncompressed streams.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the PropertyPtr table. Present only in `#-` streams.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyPtrRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x16??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// Property row this pointer resolves to
    pub property: u32,
}

impl RowReadable for PropertyPtrRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(sizes.table_index_bytes(TableId::Property))
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(PropertyPtrRaw {
            rid,
            token: Token::from_parts(0x16, rid),
            offset: *offset,
            property: read_le_at_dyn(data, offset, sizes.is_large(TableId::Property))?,
        })
    }
}

impl RowWritable for PropertyPtrRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(data, offset, self.property, sizes.is_large(TableId::Property))?;
        Ok(())
    }
}
