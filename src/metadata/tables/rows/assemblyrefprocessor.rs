//! AssemblyRefProcessor table (0x24). Shall be ignored by the CLI; carried
//! for round-trip completeness.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the AssemblyRefProcessor table (ECMA-335 II.22.7).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRefProcessorRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x24??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// Processor architecture id
    pub processor: u32,
    /// AssemblyRef row this record annotates
    pub assembly_ref: u32,
}

impl RowReadable for AssemblyRefProcessorRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(4 + sizes.table_index_bytes(TableId::AssemblyRef))
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(AssemblyRefProcessorRaw {
            rid,
            token: Token::from_parts(0x24, rid),
            offset: *offset,
            processor: read_le_at::<u32>(data, offset)?,
            assembly_ref: read_le_at_dyn(data, offset, sizes.is_large(TableId::AssemblyRef))?,
        })
    }
}

impl RowWritable for AssemblyRefProcessorRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.processor)?;
        write_le_at_dyn(
            data,
            offset,
            self.assembly_ref,
            sizes.is_large(TableId::AssemblyRef),
        )?;
        Ok(())
    }
}
