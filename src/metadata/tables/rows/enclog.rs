//! EncLog table (0x1E): edit-and-continue change log.

use crate::{
    file::io::{read_le_at, write_le_at},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the EncLog table (ECMA-335 II.22.5). Absent in shipped images;
/// carried only so uncompressed (`#-`) streams round-trip.
#[derive(Clone, Debug, PartialEq)]
pub struct EncLogRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x1E??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// Token of the changed metadata row
    pub change_token: u32,
    /// Edit-and-continue function code
    pub func_code: u32,
}

impl RowReadable for EncLogRaw {
    fn row_size(_sizes: &TableInfoRef) -> u32 {
        4 + 4
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, _sizes: &TableInfoRef) -> Result<Self> {
        Ok(EncLogRaw {
            rid,
            token: Token::from_parts(0x1E, rid),
            offset: *offset,
            change_token: read_le_at::<u32>(data, offset)?,
            func_code: read_le_at::<u32>(data, offset)?,
        })
    }
}

impl RowWritable for EncLogRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, _sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.change_token)?;
        write_le_at::<u32>(data, offset, self.func_code)?;
        Ok(())
    }
}
