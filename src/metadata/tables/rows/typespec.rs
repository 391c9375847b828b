//! TypeSpec table (0x1B): constructed types referenced by signature.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the TypeSpec table (ECMA-335 II.22.39).
///
/// The whole row is one blob: a TypeSpec signature describing an array,
/// generic instantiation, pointer or other constructed type.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeSpecRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x1B??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// `#Blob` offset of the type signature
    pub signature: u32,
}

impl RowReadable for TypeSpecRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(sizes.blob_bytes())
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(TypeSpecRaw {
            rid,
            token: Token::from_parts(0x1B, rid),
            offset: *offset,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

impl RowWritable for TypeSpecRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(data, offset, self.signature, sizes.is_large_blob())?;
        Ok(())
    }
}
