//! TypeDef table (0x02): the types defined in this module.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the TypeDef table (ECMA-335 II.22.37).
///
/// `field_list` and `method_list` point at the first owned row of the Field
/// and MethodDef tables; ownership runs to the next type's list pointer (or
/// the end of the member table for the last type). Keeping owned members
/// contiguous is an invariant of the build pipeline, not of this codec.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDefRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x02??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// TypeAttributes bit mask (visibility, layout, semantics)
    pub flags: u32,
    /// `#Strings` offset of the type name
    pub type_name: u32,
    /// `#Strings` offset of the namespace, 0 for the empty namespace
    pub type_namespace: u32,
    /// TypeDefOrRef coded index of the base type, null for interfaces and
    /// `<Module>`
    pub extends: CodedIndex,
    /// First owned row in the Field table
    pub field_list: u32,
    /// First owned row in the MethodDef table
    pub method_list: u32,
}

impl RowReadable for TypeDefRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* flags */          4 +
            /* type_name */      sizes.str_bytes() +
            /* type_namespace */ sizes.str_bytes() +
            /* extends */        sizes.coded_index_bytes(CodedIndexType::TypeDefOrRef) +
            /* field_list */     sizes.table_index_bytes(TableId::Field) +
            /* method_list */    sizes.table_index_bytes(TableId::MethodDef)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(TypeDefRaw {
            rid,
            token: Token::from_parts(0x02, rid),
            offset: *offset,
            flags: read_le_at::<u32>(data, offset)?,
            type_name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            extends: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
            field_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Field))?,
            method_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::MethodDef))?,
        })
    }
}

impl RowWritable for TypeDefRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.flags)?;
        write_le_at_dyn(data, offset, self.type_name, sizes.is_large_str())?;
        write_le_at_dyn(data, offset, self.type_namespace, sizes.is_large_str())?;
        self.extends
            .write(data, offset, sizes, CodedIndexType::TypeDefOrRef)?;
        write_le_at_dyn(data, offset, self.field_list, sizes.is_large(TableId::Field))?;
        write_le_at_dyn(
            data,
            offset,
            self.method_list,
            sizes.is_large(TableId::MethodDef),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::tables::TableInfo;

    #[test]
    fn read_write_short() {
        let data = vec![
            0x01, 0x00, 0x10, 0x00, // flags
            0x10, 0x00, // type_name
            0x20, 0x00, // type_namespace
            0x05, 0x00, // extends: (1 << 2) | 1 -> TypeRef row 1
            0x01, 0x00, // field_list
            0x01, 0x00, // method_list
        ];

        let sizes = Arc::new(TableInfo::from_counts(
            &[
                (TableId::TypeDef, 3),
                (TableId::TypeRef, 2),
                (TableId::Field, 4),
                (TableId::MethodDef, 4),
            ],
            false,
            false,
            false,
        ));
        assert_eq!(TypeDefRaw::row_size(&sizes) as usize, data.len());

        let mut offset = 0;
        let row = TypeDefRaw::row_read(&data, &mut offset, 2, &sizes).unwrap();
        assert_eq!(row.token.value(), 0x0200_0002);
        assert_eq!(row.flags, 0x0010_0001);
        assert_eq!(row.extends.tag, TableId::TypeRef);
        assert_eq!(row.extends.row, 1);
        assert_eq!(row.field_list, 1);

        let mut out = vec![0u8; data.len()];
        let mut offset = 0;
        row.row_write(&mut out, &mut offset, &sizes).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn wide_member_lists() {
        // MethodDef beyond 2^16 rows widens method_list to 4 bytes
        let sizes = Arc::new(TableInfo::from_counts(
            &[
                (TableId::TypeDef, 3),
                (TableId::Field, 4),
                (TableId::MethodDef, 0x1_0001),
            ],
            false,
            false,
            false,
        ));
        assert_eq!(TypeDefRaw::row_size(&sizes), 4 + 2 + 2 + 2 + 2 + 4);
    }
}
