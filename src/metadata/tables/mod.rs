//! The 45 CLI metadata tables: identifiers, sizing, coded indexes, row
//! codecs and the [`TableSet`] container.
//!
//! # Architecture
//!
//! Every table row exists in exactly one form, `XxxRaw`: the column values as
//! they sit on disk, with heap columns holding offsets and reference columns
//! holding row numbers or [`CodedIndex`] values. The load pipeline
//! materialises rows through [`RowReadable`]; the build pipeline appends rows
//! and serialises them through [`RowWritable`]. Turning raw rows into a
//! linked object model is the resolver's job
//! ([`crate::metadata::resolver`]), not the row codec's.
//!
//! Row numbers are 1-based; row 0 is the reserved null reference everywhere.

mod codedindex;
mod id;
mod info;
pub mod rows;
mod set;

pub use codedindex::{CodedIndex, CodedIndexType};
pub use id::TableId;
pub use info::{TableInfo, TableInfoRef, TableRowInfo};
pub use rows::*;
pub use set::{ParsedTables, TableSet};

use crate::Result;

/// Interface for parsing one table row out of the `#~` stream.
///
/// Implementations read their fixed column schema at the given offset and
/// advance it; widths of index columns come from the supplied
/// [`TableInfoRef`], which is frozen once the stream header is parsed.
pub trait RowReadable: Sized {
    /// Byte size of one row under the given index widths
    fn row_size(sizes: &TableInfoRef) -> u32;

    /// Parse one row.
    ///
    /// ## Arguments
    /// * 'data' - The table stream bytes
    /// * 'offset' - Read position, advanced by `row_size` on success
    /// * 'rid' - The 1-based row number of this entry
    /// * 'sizes' - Index width information
    ///
    /// # Errors
    /// Returns an error when the buffer is truncated or a column is invalid
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self>;
}

/// Interface for serialising one table row into the `#~` stream.
///
/// The counterpart of [`RowReadable`]; called only after sizing is final, so
/// every column width is fixed and every referenced row exists.
pub trait RowWritable: Sized {
    /// Serialise one row.
    ///
    /// ## Arguments
    /// * 'data' - The output buffer, pre-sized by the emitter
    /// * 'offset' - Write position, advanced on success
    /// * 'sizes' - Index width information
    ///
    /// # Errors
    /// Returns an error when a value does not fit its column
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfoRef) -> Result<()>;
}
