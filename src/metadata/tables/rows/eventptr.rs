//! EventPtr table (0x13): indirection layer of uncompressed streams.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the EventPtr table. Present only in `#-` streams.
#[derive(Clone, Debug, PartialEq)]
pub struct EventPtrRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x13??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// Event row this pointer resolves to
    pub event: u32,
}

impl RowReadable for EventPtrRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(sizes.table_index_bytes(TableId::Event))
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(EventPtrRaw {
            rid,
            token: Token::from_parts(0x13, rid),
            offset: *offset,
            event: read_le_at_dyn(data, offset, sizes.is_large(TableId::Event))?,
        })
    }
}

impl RowWritable for EventPtrRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(data, offset, self.event, sizes.is_large(TableId::Event))?;
        Ok(())
    }
}
