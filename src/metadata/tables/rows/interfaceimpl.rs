//! InterfaceImpl table (0x09): which types implement which interfaces.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the InterfaceImpl table (ECMA-335 II.22.23). Sorted by `class`.
#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceImplRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x09??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// TypeDef row of the implementing type
    pub class: u32,
    /// TypeDefOrRef coded index of the implemented interface
    pub interface: CodedIndex,
}

impl RowReadable for InterfaceImplRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* class */     sizes.table_index_bytes(TableId::TypeDef) +
            /* interface */ sizes.coded_index_bytes(CodedIndexType::TypeDefOrRef)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(InterfaceImplRaw {
            rid,
            token: Token::from_parts(0x09, rid),
            offset: *offset,
            class: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            interface: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
        })
    }
}

impl RowWritable for InterfaceImplRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(data, offset, self.class, sizes.is_large(TableId::TypeDef))?;
        self.interface
            .write(data, offset, sizes, CodedIndexType::TypeDefOrRef)?;
        Ok(())
    }
}
