//! EventMap table (0x12): which types own which event ranges.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the EventMap table (ECMA-335 II.22.12).
///
/// `event_list` ranges work like TypeDef's member lists: rows up to the next
/// map entry's pointer belong to `parent`.
#[derive(Clone, Debug, PartialEq)]
pub struct EventMapRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x12??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// TypeDef row owning the events
    pub parent: u32,
    /// First owned row in the Event table
    pub event_list: u32,
}

impl RowReadable for EventMapRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            sizes.table_index_bytes(TableId::TypeDef) + sizes.table_index_bytes(TableId::Event),
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(EventMapRaw {
            rid,
            token: Token::from_parts(0x12, rid),
            offset: *offset,
            parent: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            event_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Event))?,
        })
    }
}

impl RowWritable for EventMapRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(data, offset, self.parent, sizes.is_large(TableId::TypeDef))?;
        write_le_at_dyn(data, offset, self.event_list, sizes.is_large(TableId::Event))?;
        Ok(())
    }
}
