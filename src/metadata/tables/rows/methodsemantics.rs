//! MethodSemantics table (0x18): accessor methods of events and properties.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the MethodSemantics table (ECMA-335 II.22.28). Sorted by
/// `association`.
///
/// `semantics` carries the accessor kind: setter 0x01, getter 0x02,
/// other 0x04, add 0x08, remove 0x10, fire 0x20.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSemanticsRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x18??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// MethodSemanticsAttributes bit mask
    pub semantics: u16,
    /// MethodDef row of the accessor
    pub method: u32,
    /// HasSemantics coded index of the owning event or property
    pub association: CodedIndex,
}

impl RowReadable for MethodSemanticsRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            2 + sizes.table_index_bytes(TableId::MethodDef)
                + sizes.coded_index_bytes(CodedIndexType::HasSemantics),
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(MethodSemanticsRaw {
            rid,
            token: Token::from_parts(0x18, rid),
            offset: *offset,
            semantics: read_le_at::<u16>(data, offset)?,
            method: read_le_at_dyn(data, offset, sizes.is_large(TableId::MethodDef))?,
            association: CodedIndex::read(data, offset, sizes, CodedIndexType::HasSemantics)?,
        })
    }
}

impl RowWritable for MethodSemanticsRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u16>(data, offset, self.semantics)?;
        write_le_at_dyn(data, offset, self.method, sizes.is_large(TableId::MethodDef))?;
        self.association
            .write(data, offset, sizes, CodedIndexType::HasSemantics)?;
        Ok(())
    }
}
