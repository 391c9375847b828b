//! MethodPtr table (0x05): indirection layer of uncompressed streams.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the MethodPtr table. Present only in `#-` streams.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodPtrRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x05??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// MethodDef row this pointer resolves to
    pub method: u32,
}

impl RowReadable for MethodPtrRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(sizes.table_index_bytes(TableId::MethodDef))
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(MethodPtrRaw {
            rid,
            token: Token::from_parts(0x05, rid),
            offset: *offset,
            method: read_le_at_dyn(data, offset, sizes.is_large(TableId::MethodDef))?,
        })
    }
}

impl RowWritable for MethodPtrRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(data, offset, self.method, sizes.is_large(TableId::MethodDef))?;
        Ok(())
    }
}
