//! AssemblyOS table (0x22). Shall be ignored by the CLI; carried for
//! round-trip completeness.

use crate::{
    file::io::{read_le_at, write_le_at},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the AssemblyOS table (ECMA-335 II.22.3).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyOsRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x22??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// OS platform id
    pub os_platform_id: u32,
    /// OS major version
    pub os_major_version: u32,
    /// OS minor version
    pub os_minor_version: u32,
}

impl RowReadable for AssemblyOsRaw {
    fn row_size(_sizes: &TableInfoRef) -> u32 {
        4 + 4 + 4
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, _sizes: &TableInfoRef) -> Result<Self> {
        Ok(AssemblyOsRaw {
            rid,
            token: Token::from_parts(0x22, rid),
            offset: *offset,
            os_platform_id: read_le_at::<u32>(data, offset)?,
            os_major_version: read_le_at::<u32>(data, offset)?,
            os_minor_version: read_le_at::<u32>(data, offset)?,
        })
    }
}

impl RowWritable for AssemblyOsRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, _sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.os_platform_id)?;
        write_le_at::<u32>(data, offset, self.os_major_version)?;
        write_le_at::<u32>(data, offset, self.os_minor_version)?;
        Ok(())
    }
}
