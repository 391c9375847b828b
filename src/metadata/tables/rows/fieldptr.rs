//! FieldPtr table (0x03): indirection layer of uncompressed streams.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the FieldPtr table. Present only in `#-` streams, where the
/// Field table is not required to be in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldPtrRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x03??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// Field row this pointer resolves to
    pub field: u32,
}

impl RowReadable for FieldPtrRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(sizes.table_index_bytes(TableId::Field))
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(FieldPtrRaw {
            rid,
            token: Token::from_parts(0x03, rid),
            offset: *offset,
            field: read_le_at_dyn(data, offset, sizes.is_large(TableId::Field))?,
        })
    }
}

impl RowWritable for FieldPtrRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(data, offset, self.field, sizes.is_large(TableId::Field))?;
        Ok(())
    }
}
