//! DeclSecurity table (0x0E): declarative security permission sets.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the DeclSecurity table (ECMA-335 II.22.11). Sorted by `parent`.
#[derive(Clone, Debug, PartialEq)]
pub struct DeclSecurityRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x0E??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// SecurityAction code
    pub action: u16,
    /// HasDeclSecurity coded index of the protected element
    pub parent: CodedIndex,
    /// `#Blob` offset of the permission set
    pub permission_set: u32,
}

impl RowReadable for DeclSecurityRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            2 + sizes.coded_index_bytes(CodedIndexType::HasDeclSecurity) + sizes.blob_bytes(),
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(DeclSecurityRaw {
            rid,
            token: Token::from_parts(0x0E, rid),
            offset: *offset,
            action: read_le_at::<u16>(data, offset)?,
            parent: CodedIndex::read(data, offset, sizes, CodedIndexType::HasDeclSecurity)?,
            permission_set: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

impl RowWritable for DeclSecurityRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u16>(data, offset, self.action)?;
        self.parent
            .write(data, offset, sizes, CodedIndexType::HasDeclSecurity)?;
        write_le_at_dyn(data, offset, self.permission_set, sizes.is_large_blob())?;
        Ok(())
    }
}
