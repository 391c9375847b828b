//! GenericParam table (0x2A): generic parameters of types and methods.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the GenericParam table (ECMA-335 II.22.20). Sorted by
/// `(owner, number)`.
///
/// `number` is the 0-based position the parameter takes in `VAR`/`MVAR`
/// signature references.
#[derive(Clone, Debug, PartialEq)]
pub struct GenericParamRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x2A??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// 0-based ordinal of the parameter within its owner
    pub number: u16,
    /// GenericParamAttributes bit mask (variance, constraints)
    pub flags: u16,
    /// TypeOrMethodDef coded index of the owning type or method
    pub owner: CodedIndex,
    /// `#Strings` offset of the parameter name
    pub name: u32,
}

impl RowReadable for GenericParamRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* number */ 2 +
            /* flags */  2 +
            /* owner */  sizes.coded_index_bytes(CodedIndexType::TypeOrMethodDef) +
            /* name */   sizes.str_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(GenericParamRaw {
            rid,
            token: Token::from_parts(0x2A, rid),
            offset: *offset,
            number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            owner: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeOrMethodDef)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

impl RowWritable for GenericParamRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u16>(data, offset, self.number)?;
        write_le_at::<u16>(data, offset, self.flags)?;
        self.owner
            .write(data, offset, sizes, CodedIndexType::TypeOrMethodDef)?;
        write_le_at_dyn(data, offset, self.name, sizes.is_large_str())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::tables::{TableId, TableInfo};

    #[test]
    fn read_write_round_trip() {
        let data = vec![
            0x00, 0x00, // number = 0
            0x00, 0x00, // flags
            0x04, 0x00, // owner: (2 << 1) | 0 -> TypeDef row 2
            0x33, 0x00, // name
        ];

        let sizes = Arc::new(TableInfo::from_counts(
            &[(TableId::GenericParam, 1), (TableId::TypeDef, 4)],
            false,
            false,
            false,
        ));

        let mut offset = 0;
        let row = GenericParamRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(row.number, 0);
        assert_eq!(row.owner.tag, TableId::TypeDef);
        assert_eq!(row.owner.row, 2);
        assert_eq!(row.name, 0x33);

        let mut out = vec![0u8; data.len()];
        let mut offset = 0;
        row.row_write(&mut out, &mut offset, &sizes).unwrap();
        assert_eq!(out, data);
    }
}
