//! AssemblyRefOS table (0x25). Shall be ignored by the CLI; carried for
//! round-trip completeness.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the AssemblyRefOS table (ECMA-335 II.22.6).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRefOsRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x25??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// OS platform id
    pub os_platform_id: u32,
    /// OS major version
    pub os_major_version: u32,
    /// OS minor version
    pub os_minor_version: u32,
    /// AssemblyRef row this record annotates
    pub assembly_ref: u32,
}

impl RowReadable for AssemblyRefOsRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(12 + sizes.table_index_bytes(TableId::AssemblyRef))
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(AssemblyRefOsRaw {
            rid,
            token: Token::from_parts(0x25, rid),
            offset: *offset,
            os_platform_id: read_le_at::<u32>(data, offset)?,
            os_major_version: read_le_at::<u32>(data, offset)?,
            os_minor_version: read_le_at::<u32>(data, offset)?,
            assembly_ref: read_le_at_dyn(data, offset, sizes.is_large(TableId::AssemblyRef))?,
        })
    }
}

impl RowWritable for AssemblyRefOsRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.os_platform_id)?;
        write_le_at::<u32>(data, offset, self.os_major_version)?;
        write_le_at::<u32>(data, offset, self.os_minor_version)?;
        write_le_at_dyn(
            data,
            offset,
            self.assembly_ref,
            sizes.is_large(TableId::AssemblyRef),
        )?;
        Ok(())
    }
}
