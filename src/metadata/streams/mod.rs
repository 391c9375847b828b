//! Read views over the CLI metadata streams.
//!
//! Each type here is a zero-copy view over one stream's bytes, created from
//! the slices the metadata root directory describes: [`Strings`] (`#Strings`),
//! [`UserStrings`] (`#US`), [`Blob`] (`#Blob`) and [`Guid`] (`#GUID`). The
//! table stream (`#~`/`#-`) is materialised eagerly instead — see
//! [`crate::metadata::tables::TableSet::parse`].

mod blob;
mod guid;
mod strings;
mod userstrings;

pub use blob::Blob;
pub use guid::Guid;
pub use strings::Strings;
pub use userstrings::{UserStringIterator, UserStrings};
