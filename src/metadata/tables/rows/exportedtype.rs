//! ExportedType table (0x27): types exported from other files of the
//! assembly.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the ExportedType table (ECMA-335 II.22.14).
///
/// `type_def_id` is a hint: the TypeDef token the type had in its defining
/// module, to be verified by name on resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportedTypeRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x27??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// TypeAttributes bit mask
    pub flags: u32,
    /// Hint: TypeDef token inside the defining module
    pub type_def_id: u32,
    /// `#Strings` offset of the type name
    pub type_name: u32,
    /// `#Strings` offset of the namespace, 0 for the empty namespace
    pub type_namespace: u32,
    /// Implementation coded index of the defining file or assembly
    pub implementation: CodedIndex,
}

impl RowReadable for ExportedTypeRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            4 + 4
                + 2 * sizes.str_bytes()
                + sizes.coded_index_bytes(CodedIndexType::Implementation),
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ExportedTypeRaw {
            rid,
            token: Token::from_parts(0x27, rid),
            offset: *offset,
            flags: read_le_at::<u32>(data, offset)?,
            type_def_id: read_le_at::<u32>(data, offset)?,
            type_name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            implementation: CodedIndex::read(data, offset, sizes, CodedIndexType::Implementation)?,
        })
    }
}

impl RowWritable for ExportedTypeRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u32>(data, offset, self.flags)?;
        write_le_at::<u32>(data, offset, self.type_def_id)?;
        write_le_at_dyn(data, offset, self.type_name, sizes.is_large_str())?;
        write_le_at_dyn(data, offset, self.type_namespace, sizes.is_large_str())?;
        self.implementation
            .write(data, offset, sizes, CodedIndexType::Implementation)?;
        Ok(())
    }
}
