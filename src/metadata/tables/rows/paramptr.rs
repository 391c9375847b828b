//! ParamPtr table (0x07): indirection layer of uncompressed streams.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the ParamPtr table. Present only in `#-` streams.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamPtrRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x07??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// Param row this pointer resolves to
    pub param: u32,
}

impl RowReadable for ParamPtrRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(sizes.table_index_bytes(TableId::Param))
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ParamPtrRaw {
            rid,
            token: Token::from_parts(0x07, rid),
            offset: *offset,
            param: read_le_at_dyn(data, offset, sizes.is_large(TableId::Param))?,
        })
    }
}

impl RowWritable for ParamPtrRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(data, offset, self.param, sizes.is_large(TableId::Param))?;
        Ok(())
    }
}
