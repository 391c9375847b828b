//! TypeRef table (0x01): references to types defined elsewhere.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the TypeRef table (ECMA-335 II.22.38).
///
/// The resolution scope names where the type lives: an AssemblyRef for the
/// common case, a TypeRef for nested type references, a ModuleRef or Module
/// for multi-module assemblies.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeRefRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x01??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// ResolutionScope coded index locating the defining scope
    pub resolution_scope: CodedIndex,
    /// `#Strings` offset of the type name
    pub type_name: u32,
    /// `#Strings` offset of the namespace, 0 for the empty namespace
    pub type_namespace: u32,
}

impl RowReadable for TypeRefRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* resolution_scope */ sizes.coded_index_bytes(CodedIndexType::ResolutionScope) +
            /* type_name */        sizes.str_bytes() +
            /* type_namespace */   sizes.str_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(TypeRefRaw {
            rid,
            token: Token::from_parts(0x01, rid),
            offset: *offset,
            resolution_scope: CodedIndex::read(
                data,
                offset,
                sizes,
                CodedIndexType::ResolutionScope,
            )?,
            type_name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

impl RowWritable for TypeRefRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        self.resolution_scope
            .write(data, offset, sizes, CodedIndexType::ResolutionScope)?;
        write_le_at_dyn(data, offset, self.type_name, sizes.is_large_str())?;
        write_le_at_dyn(data, offset, self.type_namespace, sizes.is_large_str())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::tables::{TableId, TableInfo};

    #[test]
    fn read_write_short() {
        let data = vec![
            0x06, 0x00, // resolution_scope: (1 << 2) | 2 -> AssemblyRef row 1
            0x0A, 0x00, // type_name
            0x14, 0x00, // type_namespace
        ];

        let sizes = Arc::new(TableInfo::from_counts(
            &[(TableId::TypeRef, 2), (TableId::AssemblyRef, 1)],
            false,
            false,
            false,
        ));

        let mut offset = 0;
        let row = TypeRefRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(row.token.value(), 0x0100_0001);
        assert_eq!(row.resolution_scope.tag, TableId::AssemblyRef);
        assert_eq!(row.resolution_scope.row, 1);
        assert_eq!(row.type_name, 0x0A);
        assert_eq!(row.type_namespace, 0x14);

        let mut out = vec![0u8; data.len()];
        let mut offset = 0;
        row.row_write(&mut out, &mut offset, &sizes).unwrap();
        assert_eq!(out, data);
    }
}
