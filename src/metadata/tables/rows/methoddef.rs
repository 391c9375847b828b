//! MethodDef table (0x06): the methods defined in this module.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the MethodDef table (ECMA-335 II.22.26).
///
/// `rva` locates the method body inside the image and is 0 for abstract,
/// extern and runtime-provided methods. `param_list` points at the first
/// owned Param row, delimited by the next method's pointer — the same
/// contiguous-range scheme TypeDef uses for its members.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodDefRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x06??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// RVA of the method body, 0 when the method has none
    pub rva: u32,
    /// MethodImplAttributes bit mask
    pub impl_flags: u16,
    /// MethodAttributes bit mask
    pub flags: u16,
    /// `#Strings` offset of the method name
    pub name: u32,
    /// `#Blob` offset of the MethodDefSig
    pub signature: u32,
    /// First owned row in the Param table
    pub param_list: u32,
}

impl RowReadable for MethodDefRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* rva */        4 +
            /* impl_flags */ 2 +
            /* flags */      2 +
            /* name */       sizes.str_bytes() +
            /* signature */  sizes.blob_bytes() +
            /* param_list */ sizes.table_index_bytes(TableId::Param)
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(MethodDefRaw {
            rid,
            token: Token::from_parts(0x06, rid),
            offset: *offset,
            rva: read_le_at::<u32>(data, offset)?,
            impl_flags: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
            param_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Param))?,
        })
    }
}

impl RowWritable for MethodDefRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.rva)?;
        write_le_at::<u16>(data, offset, self.impl_flags)?;
        write_le_at::<u16>(data, offset, self.flags)?;
        write_le_at_dyn(data, offset, self.name, sizes.is_large_str())?;
        write_le_at_dyn(data, offset, self.signature, sizes.is_large_blob())?;
        write_le_at_dyn(data, offset, self.param_list, sizes.is_large(TableId::Param))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::tables::TableInfo;

    #[test]
    fn read_write_round_trip() {
        let data = vec![
            0x50, 0x20, 0x00, 0x00, // rva
            0x00, 0x00, // impl_flags
            0x96, 0x00, // flags: public | static | hidebysig
            0x30, 0x00, // name
            0x0A, 0x00, // signature
            0x01, 0x00, // param_list
        ];

        let sizes = Arc::new(TableInfo::from_counts(
            &[(TableId::MethodDef, 2), (TableId::Param, 3)],
            false,
            false,
            false,
        ));
        assert_eq!(MethodDefRaw::row_size(&sizes) as usize, data.len());

        let mut offset = 0;
        let row = MethodDefRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(row.token.value(), 0x0600_0001);
        assert_eq!(row.rva, 0x2050);
        assert_eq!(row.flags, 0x96);
        assert_eq!(row.param_list, 1);

        let mut out = vec![0u8; data.len()];
        let mut offset = 0;
        row.row_write(&mut out, &mut offset, &sizes).unwrap();
        assert_eq!(out, data);
    }
}
