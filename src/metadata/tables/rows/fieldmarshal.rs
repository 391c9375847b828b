//! FieldMarshal table (0x0D): interop marshalling descriptors.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the FieldMarshal table (ECMA-335 II.22.17). Sorted by `parent`.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldMarshalRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x0D??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// HasFieldMarshal coded index of the owning field or param
    pub parent: CodedIndex,
    /// `#Blob` offset of the native type descriptor
    pub native_type: u32,
}

impl RowReadable for FieldMarshalRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            sizes.coded_index_bytes(CodedIndexType::HasFieldMarshal) + sizes.blob_bytes(),
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(FieldMarshalRaw {
            rid,
            token: Token::from_parts(0x0D, rid),
            offset: *offset,
            parent: CodedIndex::read(data, offset, sizes, CodedIndexType::HasFieldMarshal)?,
            native_type: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

impl RowWritable for FieldMarshalRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        self.parent
            .write(data, offset, sizes, CodedIndexType::HasFieldMarshal)?;
        write_le_at_dyn(data, offset, self.native_type, sizes.is_large_blob())?;
        Ok(())
    }
}
