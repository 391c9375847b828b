//! ECMA-335 CLI metadata: streams, tables, signatures and method bodies.
//!
//! This is the heart of the crate. The layering, leaf to root:
//!
//! - [`token`] - 32-bit metadata tokens
//! - [`cor20`] / [`root`] - the CLI header and the metadata root directory
//! - [`streams`] - read views over the four heaps
//! - [`tables`] - row schemas, coded indexes and the [`tables::TableSet`]
//! - [`signatures`] - the blob signature codec
//! - [`method`] - method body headers and exception clauses
//! - [`image`] - [`image::CilImage`], the load pipeline root
//! - [`resolver`] - index-to-reference resolution into a linked model

pub mod cor20;
pub mod image;
pub mod method;
pub mod resolver;
pub mod root;
pub mod signatures;
pub mod streams;
pub mod tables;
pub mod token;
pub mod typesystem;
