//! Field table (0x04): the fields owned by the types of this module.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the Field table (ECMA-335 II.22.15).
///
/// Which type owns a field is not stored here; it follows from the owning
/// TypeDef row's `field_list` range.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x04??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// FieldAttributes bit mask
    pub flags: u16,
    /// `#Strings` offset of the field name
    pub name: u32,
    /// `#Blob` offset of the FieldSig
    pub signature: u32,
}

impl RowReadable for FieldRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* flags */     2 +
            /* name */      sizes.str_bytes() +
            /* signature */ sizes.blob_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(FieldRaw {
            rid,
            token: Token::from_parts(0x04, rid),
            offset: *offset,
            flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

impl RowWritable for FieldRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u16>(data, offset, self.flags)?;
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
            0x16, 0x00, // flags: public | static | literal
            0x2A, 0x00, // name
            0x08, 0x00, // signature
        ];

        let sizes = Arc::new(TableInfo::from_counts(
            &[(TableId::Field, 1)],
            false,
            false,
            false,
        ));

        let mut offset = 0;
        let row = FieldRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(row.token.value(), 0x0400_0001);
        assert_eq!(row.flags, 0x16);
        assert_eq!(row.name, 0x2A);
        assert_eq!(row.signature, 0x08);

        let mut out = vec![0u8; data.len()];
        let mut offset = 0;
        row.row_write(&mut out, &mut offset, &sizes).unwrap();
        assert_eq!(out, data);
    }
}
