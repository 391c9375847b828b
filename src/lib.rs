#![deny(missing_docs)]
#![allow(dead_code)]

//! # cilforge
//!
//! A library for reading, building and writing ECMA-335 CLI metadata inside
//! Portable Executable images — the binary format of managed assemblies
//! (.dll / .exe). Built in pure Rust, `cilforge` parses the metadata tables,
//! heaps, signatures and IL method bodies of an existing image into a
//! queryable object model, and emits images built programmatically through
//! the same table and heap machinery.
//!
//! # Architecture
//!
//! - **File layer** ([`crate::file`]): buffered PE image access, section
//!   table, RVA translation, and the positioned byte [`Parser`].
//! - **Metadata layer** ([`crate::metadata`]): the `#~` table stream, the
//!   four heaps, coded indexes, blob signatures and method body headers.
//! - **IL layer** ([`crate::assembly`]): opcode tables, instruction decoding
//!   with branch labels, and the body encoder.
//! - **Builder** ([`crate::builder`]): the write pipeline — interning heaps,
//!   row contribution, table sorting, stream emission and PE placement.
//!
//! # Usage Examples
//!
//! ## Loading an assembly
//!
//! ```rust,no_run
//! use cilforge::CilImage;
//!
//! let image = CilImage::from_file("library.dll".as_ref())?;
//! let model = image.resolve()?;
//! for ty in &model.types {
//!     println!("{}.{}: {} methods", ty.namespace, ty.name, ty.methods.len());
//! }
//! # Ok::<(), cilforge::Error>(())
//! ```
//!
//! ## Building an assembly
//!
//! ```rust,no_run
//! use cilforge::builder::CilAssembly;
//!
//! let mut asm = CilAssembly::new("Empty", (1, 0, 0, 0), "Empty.dll");
//! let bytes = asm.finish()?;
//! std::fs::write("Empty.dll", bytes)?;
//! # Ok::<(), cilforge::Error>(())
//! ```

#[macro_use]
mod error;

pub mod assembly;
pub mod builder;
pub mod file;
pub mod metadata;

pub use crate::error::Error;
pub use crate::file::parser::Parser;
pub use crate::metadata::image::CilImage;
pub use crate::metadata::token::Token;

/// Standard result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
