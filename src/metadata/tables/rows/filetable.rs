//! File table (0x26): other files of a multi-file assembly.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the File table (ECMA-335 II.22.19).
#[derive(Clone, Debug, PartialEq)]
pub struct FileRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x26??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// FileAttributes: 0 contains metadata, 1 does not
    pub flags: u32,
    /// `#Strings` offset of the file name
    pub name: u32,
    /// `#Blob` offset of the file hash
    pub hash_value: u32,
}

impl RowReadable for FileRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(4 + sizes.str_bytes() + sizes.blob_bytes())
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(FileRaw {
            rid,
            token: Token::from_parts(0x26, rid),
            offset: *offset,
            flags: read_le_at::<u32>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            hash_value: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

impl RowWritable for FileRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.flags)?;
        write_le_at_dyn(data, offset, self.name, sizes.is_large_str())?;
        write_le_at_dyn(data, offset, self.hash_value, sizes.is_large_blob())?;
        Ok(())
    }
}
