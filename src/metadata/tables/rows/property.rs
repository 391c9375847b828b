//! Property table (0x17): property members.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the Property table (ECMA-335 II.22.34).
///
/// `signature` holds a PropertySig blob; getter and setter are attached via
/// MethodSemantics rows.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x17??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// PropertyAttributes bit mask
    pub flags: u16,
    /// `#Strings` offset of the property name
    pub name: u32,
    /// `#Blob` offset of the PropertySig
    pub signature: u32,
}

impl RowReadable for PropertyRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(2 + sizes.str_bytes() + sizes.blob_bytes())
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(PropertyRaw {
            rid,
            token: Token::from_parts(0x17, rid),
            offset: *offset,
            flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

impl RowWritable for PropertyRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u16>(data, offset, self.flags)?;
        write_le_at_dyn(data, offset, self.name, sizes.is_large_str())?;
        write_le_at_dyn(data, offset, self.signature, sizes.is_large_blob())?;
        Ok(())
    }
}
