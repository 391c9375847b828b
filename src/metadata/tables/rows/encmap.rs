//! EncMap table (0x1F): edit-and-continue token remapping.

use crate::{
    file::io::{read_le_at, write_le_at},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the EncMap table (ECMA-335 II.22.6). Absent in shipped images;
/// carried only so uncompressed (`#-`) streams round-trip.
#[derive(Clone, Debug, PartialEq)]
pub struct EncMapRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x1F??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// Token of the mapped metadata row
    pub map_token: u32,
}

impl RowReadable for EncMapRaw {
    fn row_size(_sizes: &TableInfoRef) -> u32 {
        4
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, _sizes: &TableInfoRef) -> Result<Self> {
        Ok(EncMapRaw {
            rid,
            token: Token::from_parts(0x1F, rid),
            offset: *offset,
            map_token: read_le_at::<u32>(data, offset)?,
        })
    }
}

impl RowWritable for EncMapRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, _sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.map_token)?;
        Ok(())
    }
}
