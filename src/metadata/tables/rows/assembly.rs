//! Assembly table (0x20): the manifest of this assembly.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the Assembly table (ECMA-335 II.22.2).
///
/// At most one row exists; modules without a manifest (netmodules) have none.
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x20??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// AssemblyHashAlgorithm, 0x8004 (SHA1) in practice
    pub hash_alg_id: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// AssemblyFlags bit mask
    pub flags: u32,
    /// `#Blob` offset of the public key, 0 when unsigned
    pub public_key: u32,
    /// `#Strings` offset of the assembly name
    pub name: u32,
    /// `#Strings` offset of the culture, 0 for neutral
    pub culture: u32,
}

impl RowReadable for AssemblyRaw {
    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* hash_alg_id */ 4 +
            /* versions */    8 +
            /* flags */       4 +
            /* public_key */  sizes.blob_bytes() +
            /* name */        sizes.str_bytes() +
            /* culture */     sizes.str_bytes()
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(AssemblyRaw {
            rid,
            token: Token::from_parts(0x20, rid),
            offset: *offset,
            hash_alg_id: read_le_at::<u32>(data, offset)?,
            major_version: read_le_at::<u16>(data, offset)?,
            minor_version: read_le_at::<u16>(data, offset)?,
            build_number: read_le_at::<u16>(data, offset)?,
            revision_number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            public_key: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            culture: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

impl RowWritable for AssemblyRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.hash_alg_id)?;
        write_le_at::<u16>(data, offset, self.major_version)?;
        write_le_at::<u16>(data, offset, self.minor_version)?;
        write_le_at::<u16>(data, offset, self.build_number)?;
        write_le_at::<u16>(data, offset, self.revision_number)?;
        write_le_at::<u32>(data, offset, self.flags)?;
        write_le_at_dyn(data, offset, self.public_key, sizes.is_large_blob())?;
        write_le_at_dyn(data, offset, self.name, sizes.is_large_str())?;
        write_le_at_dyn(data, offset, self.culture, sizes.is_large_str())?;
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
            0x04, 0x80, 0x00, 0x00, // hash_alg_id = SHA1
            0x01, 0x00, // major = 1
            0x02, 0x00, // minor = 2
            0x03, 0x00, // build = 3
            0x04, 0x00, // revision = 4
            0x00, 0x00, 0x00, 0x00, // flags
            0x00, 0x00, // public_key
            0x05, 0x00, // name
            0x00, 0x00, // culture
        ];

        let sizes = Arc::new(TableInfo::from_counts(
            &[(TableId::Assembly, 1)],
            false,
            false,
            false,
        ));
        assert_eq!(AssemblyRaw::row_size(&sizes) as usize, data.len());

        let mut offset = 0;
        let row = AssemblyRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(row.hash_alg_id, 0x8004);
        assert_eq!(
            (
                row.major_version,
                row.minor_version,
                row.build_number,
                row.revision_number
            ),
            (1, 2, 3, 4)
        );

        let mut out = vec![0u8; data.len()];
        let mut offset = 0;
        row.row_write(&mut out, &mut offset, &sizes).unwrap();
        assert_eq!(out, data);
    }
}
