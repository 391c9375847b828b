//! Param table (0x08): parameter rows owned by methods.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the Param table (ECMA-335 II.22.33).
///
/// Sequence 0 names the return value; parameters count from 1. Types are not
/// stored here — they live in the owning method's signature blob.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x08??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// ParamAttributes bit mask
    pub flags: u16,
    /// Parameter position; 0 is the return value
    pub sequence: u16,
    /// `#Strings` offset of the parameter name, 0 when unnamed
    pub name: u32,
}

impl RowReadable for ParamRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(2 + 2 + sizes.str_bytes())
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ParamRaw {
            rid,
            token: Token::from_parts(0x08, rid),
            offset: *offset,
            flags: read_le_at::<u16>(data, offset)?,
            sequence: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

impl RowWritable for ParamRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u16>(data, offset, self.flags)?;
        write_le_at::<u16>(data, offset, self.sequence)?;
        write_le_at_dyn(data, offset, self.name, sizes.is_large_str())?;
        Ok(())
    }
}
