//! MethodImpl table (0x19): explicit interface method implementations.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the MethodImpl table (ECMA-335 II.22.27). Sorted by `class`.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodImplRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x19??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// TypeDef row providing the implementation
    pub class: u32,
    /// MethodDefOrRef coded index of the implementing method body
    pub method_body: CodedIndex,
    /// MethodDefOrRef coded index of the declared method being implemented
    pub method_declaration: CodedIndex,
}

impl RowReadable for MethodImplRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            sizes.table_index_bytes(TableId::TypeDef)
                + 2 * sizes.coded_index_bytes(CodedIndexType::MethodDefOrRef),
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(MethodImplRaw {
            rid,
            token: Token::from_parts(0x19, rid),
            offset: *offset,
            class: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            method_body: CodedIndex::read(data, offset, sizes, CodedIndexType::MethodDefOrRef)?,
            method_declaration: CodedIndex::read(
                data,
                offset,
                sizes,
                CodedIndexType::MethodDefOrRef,
            )?,
        })
    }
}

impl RowWritable for MethodImplRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(data, offset, self.class, sizes.is_large(TableId::TypeDef))?;
        self.method_body
            .write(data, offset, sizes, CodedIndexType::MethodDefOrRef)?;
        self.method_declaration
            .write(data, offset, sizes, CodedIndexType::MethodDefOrRef)?;
        Ok(())
    }
}
