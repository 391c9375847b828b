//! NestedClass table (0x29): the containment relation between types.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the NestedClass table (ECMA-335 II.22.32). Sorted by
/// `nested_class`.
///
/// Both columns index the TypeDef table; the nested type inherits its
/// accessibility scoping from the enclosing one.
#[derive(Clone, Debug, PartialEq)]
pub struct NestedClassRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x29??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// TypeDef row of the nested type
    pub nested_class: u32,
    /// TypeDef row of the enclosing type
    pub enclosing_class: u32,
}

impl RowReadable for NestedClassRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* nested_class */    sizes.table_index_bytes(TableId::TypeDef) +
            /* enclosing_class */ sizes.table_index_bytes(TableId::TypeDef)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(NestedClassRaw {
            rid,
            token: Token::from_parts(0x29, rid),
            offset: *offset,
            nested_class: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            enclosing_class: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
        })
    }
}

impl RowWritable for NestedClassRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at_dyn(
            data,
            offset,
            self.nested_class,
            sizes.is_large(TableId::TypeDef),
        )?;
        write_le_at_dyn(
            data,
            offset,
            self.enclosing_class,
            sizes.is_large(TableId::TypeDef),
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
            0x02, 0x00, // nested_class
            0x01, 0x00, // enclosing_class
        ];

        let sizes = Arc::new(TableInfo::from_counts(
            &[(TableId::NestedClass, 1), (TableId::TypeDef, 10)],
            false,
            false,
            false,
        ));

        let mut offset = 0;
        let row = NestedClassRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(row.token.value(), 0x2900_0001);
        assert_eq!(row.nested_class, 2);
        assert_eq!(row.enclosing_class, 1);

        let mut out = vec![0u8; data.len()];
        let mut offset = 0;
        row.row_write(&mut out, &mut offset, &sizes).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn read_write_wide() {
        let data = vec![
            0x01, 0x01, 0x01, 0x01, // nested_class
            0x02, 0x02, 0x02, 0x02, // enclosing_class
        ];

        let sizes = Arc::new(TableInfo::from_counts(
            &[(TableId::TypeDef, 0x1_0002)],
            false,
            false,
            false,
        ));
        assert_eq!(NestedClassRaw::row_size(&sizes), 8);

        let mut offset = 0;
        let row = NestedClassRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(row.nested_class, 0x0101_0101);
        assert_eq!(row.enclosing_class, 0x0202_0202);

        let mut out = vec![0u8; data.len()];
        let mut offset = 0;
        row.row_write(&mut out, &mut offset, &sizes).unwrap();
        assert_eq!(out, data);
    }
}
