//! Module table (0x00): the one-row table naming the current module.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the Module table (ECMA-335 II.22.30).
///
/// A module has exactly one row here, carrying its name and the MVID that
/// identifies this particular build. The generation and ENC columns are
/// edit-and-continue leftovers and are zero in shipped images.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x00??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// Generation, reserved, shall be 0
    pub generation: u16,
    /// `#Strings` offset of the module name
    pub name: u32,
    /// `#GUID` ordinal of the MVID
    pub mvid: u32,
    /// `#GUID` ordinal of the ENC id, 0 when unused
    pub enc_id: u32,
    /// `#GUID` ordinal of the ENC base id, 0 when unused
    pub enc_base_id: u32,
}

impl RowReadable for ModuleRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* generation */  2 +
            /* name */        sizes.str_bytes() +
            /* mvid */        sizes.guid_bytes() +
            /* enc_id */      sizes.guid_bytes() +
            /* enc_base_id */ sizes.guid_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ModuleRaw {
            rid,
            token: Token::from_parts(0x00, rid),
            offset: *offset,
            generation: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            mvid: read_le_at_dyn(data, offset, sizes.is_large_guid())?,
            enc_id: read_le_at_dyn(data, offset, sizes.is_large_guid())?,
            enc_base_id: read_le_at_dyn(data, offset, sizes.is_large_guid())?,
        })
    }
}

impl RowWritable for ModuleRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u16>(data, offset, self.generation)?;
        write_le_at_dyn(data, offset, self.name, sizes.is_large_str())?;
        write_le_at_dyn(data, offset, self.mvid, sizes.is_large_guid())?;
        write_le_at_dyn(data, offset, self.enc_id, sizes.is_large_guid())?;
        write_le_at_dyn(data, offset, self.enc_base_id, sizes.is_large_guid())?;
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
            0x00, 0x00, // generation
            0x01, 0x00, // name
            0x01, 0x00, // mvid
            0x00, 0x00, // enc_id
            0x00, 0x00, // enc_base_id
        ];

        let sizes = Arc::new(TableInfo::from_counts(
            &[(TableId::Module, 1)],
            false,
            false,
            false,
        ));
        assert_eq!(ModuleRaw::row_size(&sizes) as usize, data.len());

        let mut offset = 0;
        let row = ModuleRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(row.token.value(), 0x0000_0001);
        assert_eq!(row.name, 1);
        assert_eq!(row.mvid, 1);

        let mut out = vec![0u8; data.len()];
        let mut offset = 0;
        row.row_write(&mut out, &mut offset, &sizes).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn read_write_wide_heaps() {
        let data = vec![
            0x00, 0x00, // generation
            0x04, 0x03, 0x02, 0x01, // name (4 byte #Strings index)
            0x01, 0x00, 0x00, 0x00, // mvid
            0x00, 0x00, 0x00, 0x00, // enc_id
            0x00, 0x00, 0x00, 0x00, // enc_base_id
        ];

        let sizes = Arc::new(TableInfo::from_counts(
            &[(TableId::Module, 1)],
            true,
            true,
            true,
        ));
        assert_eq!(ModuleRaw::row_size(&sizes) as usize, data.len());

        let mut offset = 0;
        let row = ModuleRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(row.name, 0x0102_0304);

        let mut out = vec![0u8; data.len()];
        let mut offset = 0;
        row.row_write(&mut out, &mut offset, &sizes).unwrap();
        assert_eq!(out, data);
    }
}
