//! GenericParamConstraint table (0x2C): constraints on generic parameters.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the GenericParamConstraint table (ECMA-335 II.22.21). Sorted
/// by `owner`.
///
/// `owner` indexes the GenericParam table, so it must be renumbered when
/// GenericParam is sorted during emission.
#[derive(Clone, Debug, PartialEq)]
pub struct GenericParamConstraintRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x2C??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// GenericParam row being constrained
    pub owner: u32,
    /// TypeDefOrRef coded index of the constraint type
    pub constraint: CodedIndex,
}

impl RowReadable for GenericParamConstraintRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            sizes.table_index_bytes(TableId::GenericParam)
                + sizes.coded_index_bytes(CodedIndexType::TypeDefOrRef),
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(GenericParamConstraintRaw {
            rid,
            token: Token::from_parts(0x2C, rid),
            offset: *offset,
            owner: read_le_at_dyn(data, offset, sizes.is_large(TableId::GenericParam))?,
            constraint: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
        })
    }
}

impl RowWritable for GenericParamConstraintRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(
            data,
            offset,
            self.owner,
            sizes.is_large(TableId::GenericParam),
        )?;
        self.constraint
            .write(data, offset, sizes, CodedIndexType::TypeDefOrRef)?;
        Ok(())
    }
}
