//! ManifestResource table (0x28): resources carried by the assembly.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the ManifestResource table (ECMA-335 II.22.24).
///
/// A null `implementation` means the resource data lives in this image, at
/// `data_offset` inside the Cor20 resources directory.
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestResourceRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x28??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// Offset of the resource data inside the resources blob
    pub data_offset: u32,
    /// ManifestResourceAttributes: 1 public, 2 private
    pub flags: u32,
    /// `#Strings` offset of the resource name
    pub name: u32,
    /// Implementation coded index, null for resources in this file
    pub implementation: CodedIndex,
}

impl RowReadable for ManifestResourceRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            4 + 4 + sizes.str_bytes() + sizes.coded_index_bytes(CodedIndexType::Implementation),
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ManifestResourceRaw {
            rid,
            token: Token::from_parts(0x28, rid),
            offset: *offset,
            data_offset: read_le_at::<u32>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            implementation: CodedIndex::read(data, offset, sizes, CodedIndexType::Implementation)?,
        })
    }
}

impl RowWritable for ManifestResourceRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.data_offset)?;
        write_le_at::<u32>(data, offset, self.flags)?;
        write_le_at_dyn(data, offset, self.name, sizes.is_large_str())?;
        self.implementation
            .write(data, offset, sizes, CodedIndexType::Implementation)?;
        Ok(())
    }
}
