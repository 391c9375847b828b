//! CustomAttribute table (0x0C): attribute instances attached to metadata.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the CustomAttribute table (ECMA-335 II.22.10). Sorted by
/// `parent`.
///
/// `constructor` is the attribute type's `.ctor` (a MethodDef for attributes
/// defined in this module, a MemberRef otherwise); `value` is the serialised
/// argument blob, 0 for attributes without arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomAttributeRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x0C??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// HasCustomAttribute coded index of the decorated element
    pub parent: CodedIndex,
    /// CustomAttributeType coded index of the attribute constructor
    pub constructor: CodedIndex,
    /// `#Blob` offset of the argument blob
    pub value: u32,
}

impl RowReadable for CustomAttributeRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* parent */      sizes.coded_index_bytes(CodedIndexType::HasCustomAttribute) +
            /* constructor */ sizes.coded_index_bytes(CodedIndexType::CustomAttributeType) +
            /* value */       sizes.blob_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(CustomAttributeRaw {
            rid,
            token: Token::from_parts(0x0C, rid),
            offset: *offset,
            parent: CodedIndex::read(data, offset, sizes, CodedIndexType::HasCustomAttribute)?,
            constructor: CodedIndex::read(
                data,
                offset,
                sizes,
                CodedIndexType::CustomAttributeType,
            )?,
            value: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

impl RowWritable for CustomAttributeRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        self.parent
            .write(data, offset, sizes, CodedIndexType::HasCustomAttribute)?;
        self.constructor
            .write(data, offset, sizes, CodedIndexType::CustomAttributeType)?;
        write_le_at_dyn(data, offset, self.value, sizes.is_large_blob())?;
        Ok(())
    }
}
