//! MemberRef table (0x0A): references to fields and methods of other scopes.

use crate::{
    file::io::{read_le_at_dyn, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the MemberRef table (ECMA-335 II.22.25).
///
/// A MemberRef is identified by its parent, name and signature blob; the
/// build pipeline deduplicates on exactly that triple so IL referencing the
/// same external member shares one row.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberRefRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x0A??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// MemberRefParent coded index of the declaring scope
    pub class: CodedIndex,
    /// `#Strings` offset of the member name
    pub name: u32,
    /// `#Blob` offset of the member signature
    pub signature: u32,
}

impl RowReadable for MemberRefRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* class */     sizes.coded_index_bytes(CodedIndexType::MemberRefParent) +
            /* name */      sizes.str_bytes() +
            /* signature */ sizes.blob_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(MemberRefRaw {
            rid,
            token: Token::from_parts(0x0A, rid),
            offset: *offset,
            class: CodedIndex::read(data, offset, sizes, CodedIndexType::MemberRefParent)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

impl RowWritable for MemberRefRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        self.class
            .write(data, offset, sizes, CodedIndexType::MemberRefParent)?;
        write_le_at_dyn(data, offset, self.name, sizes.is_large_str())?;
        write_le_at_dyn(data, offset, self.signature, sizes.is_large_blob())?;
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
            0x09, 0x00, // class: (1 << 3) | 1 -> TypeRef row 1
            0x42, 0x00, // name
            0x10, 0x00, // signature
        ];

        let sizes = Arc::new(TableInfo::from_counts(
            &[(TableId::MemberRef, 1), (TableId::TypeRef, 2)],
            false,
            false,
            false,
        ));

        let mut offset = 0;
        let row = MemberRefRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(row.class.tag, TableId::TypeRef);
        assert_eq!(row.class.row, 1);

        let mut out = vec![0u8; data.len()];
        let mut offset = 0;
        row.row_write(&mut out, &mut offset, &sizes).unwrap();
        assert_eq!(out, data);
    }
}
