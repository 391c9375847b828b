//! AssemblyProcessor table (0x21). Shall be ignored by the CLI; carried for
//! round-trip completeness.

use crate::{
    file::io::{read_le_at, write_le_at},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the AssemblyProcessor table (ECMA-335 II.22.4).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyProcessorRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x21??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// Processor architecture id
    pub processor: u32,
}

impl RowReadable for AssemblyProcessorRaw {
    fn row_size(_sizes: &TableInfoRef) -> u32 {
        4
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, _sizes: &TableInfoRef) -> Result<Self> {
        Ok(AssemblyProcessorRaw {
            rid,
            token: Token::from_parts(0x21, rid),
            offset: *offset,
            processor: read_le_at::<u32>(data, offset)?,
        })
    }
}

impl RowWritable for AssemblyProcessorRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, _sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.processor)?;
        Ok(())
    }
}
