//! Event table (0x14): event members.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the Event table (ECMA-335 II.22.13).
///
/// The add/remove/raise accessors live in MethodSemantics rows pointing back
/// at this event.
#[derive(Clone, Debug, PartialEq)]
pub struct EventRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x14??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// EventAttributes bit mask
    pub event_flags: u16,
    /// `#Strings` offset of the event name
    pub name: u32,
    /// TypeDefOrRef coded index of the delegate type
    pub event_type: CodedIndex,
}

impl RowReadable for EventRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            2 + sizes.str_bytes() + sizes.coded_index_bytes(CodedIndexType::TypeDefOrRef),
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(EventRaw {
            rid,
            token: Token::from_parts(0x14, rid),
            offset: *offset,
            event_flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            event_type: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
        })
    }
}

impl RowWritable for EventRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u16>(data, offset, self.event_flags)?;
        write_le_at_dyn(data, offset, self.name, sizes.is_large_str())?;
        self.event_type
            .write(data, offset, sizes, CodedIndexType::TypeDefOrRef)?;
        Ok(())
    }
}
