//! MethodSpec table (0x2B): generic method instantiations.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the MethodSpec table (ECMA-335 II.22.29).
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSpecRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x2B??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// MethodDefOrRef coded index of the generic method being instantiated
    pub method: CodedIndex,
    /// `#Blob` offset of the MethodSpec instantiation signature
    pub instantiation: u32,
}

impl RowReadable for MethodSpecRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            sizes.coded_index_bytes(CodedIndexType::MethodDefOrRef) + sizes.blob_bytes(),
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(MethodSpecRaw {
            rid,
            token: Token::from_parts(0x2B, rid),
            offset: *offset,
            method: CodedIndex::read(data, offset, sizes, CodedIndexType::MethodDefOrRef)?,
            instantiation: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

impl RowWritable for MethodSpecRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        self.method
            .write(data, offset, sizes, CodedIndexType::MethodDefOrRef)?;
        write_le_at_dyn(data, offset, self.instantiation, sizes.is_large_blob())?;
        Ok(())
    }
}
