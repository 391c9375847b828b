//! ModuleRef table (0x1A): references to other modules.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the ModuleRef table (ECMA-335 II.22.31).
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleRefRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x1A??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// `#Strings` offset of the referenced module name
    pub name: u32,
}

impl RowReadable for ModuleRefRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(sizes.str_bytes())
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ModuleRefRaw {
            rid,
            token: Token::from_parts(0x1A, rid),
            offset: *offset,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

impl RowWritable for ModuleRefRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(data, offset, self.name, sizes.is_large_str())?;
        Ok(())
    }
}
