//! ImplMap table (0x1C): P/Invoke forwarding of members to native modules.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, RowWritable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Raw row of the ImplMap table (ECMA-335 II.22.22). Sorted by
/// `member_forwarded`.
#[derive(Clone, Debug, PartialEq)]
pub struct ImplMapRaw {
    /// 1-based row number
    pub rid: u32,
    /// Token of this row (0x1C??????)
    pub token: Token,
    /// Byte offset of this row in the table stream
    pub offset: usize,

    /// PInvokeAttributes bit mask
    pub mapping_flags: u16,
    /// MemberForwarded coded index of the forwarded member
    pub member_forwarded: CodedIndex,
    /// `#Strings` offset of the native entry point name
    pub import_name: u32,
    /// ModuleRef row of the native module
    pub import_scope: u32,
}

impl RowReadable for ImplMapRaw {
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            2 + sizes.coded_index_bytes(CodedIndexType::MemberForwarded)
                + sizes.str_bytes()
                + sizes.table_index_bytes(TableId::ModuleRef),
        )
    }

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(ImplMapRaw {
            rid,
            token: Token::from_parts(0x1C, rid),
            offset: *offset,
            mapping_flags: read_le_at::<u16>(data, offset)?,
            member_forwarded: CodedIndex::read(
                data,
                offset,
                sizes,
                CodedIndexType::MemberForwarded,
            )?,
            import_name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            import_scope: read_le_at_dyn(data, offset, sizes.is_large(TableId::ModuleRef))?,
        })
    }
}

impl RowWritable for ImplMapRaw {
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()> {
        write_le_at::<u16>(data, offset, self.mapping_flags)?;
        self.member_forwarded
            .write(data, offset, sizes, CodedIndexType::MemberForwarded)?;
        write_le_at_dyn(data, offset, self.import_name, sizes.is_large_str())?;
        write_le_at_dyn(
            data,
            offset,
            self.import_scope,
            sizes.is_large(TableId::ModuleRef),
        )?;
        Ok(())
    }
}
