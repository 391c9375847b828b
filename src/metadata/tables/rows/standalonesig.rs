//! StandAloneSig table (0x11): signatures referenced by token.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the StandAloneSig table (ECMA-335 II.22.36).
///
/// Holds local variable signatures referenced from method body headers and
/// the call-site signatures of `calli`.
#[derive(Clone, Debug, PartialEq)]
pub struct StandAloneSigRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x11??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// `#Blob` offset of the signature
    pub signature: u32,
}

impl RowReadable for StandAloneSigRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(sizes.blob_bytes())
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(StandAloneSigRaw {
            rid,
            token: Token::from_parts(0x11, rid),
            offset: *offset,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

impl RowWritable for StandAloneSigRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(data, offset, self.signature, sizes.is_large_blob())?;
        Ok(())
    }
}
