//! CIL instruction codec: opcode tables, disassembly and assembly.
//!
//! - [`opcodes`] holds the raw byte constants of every CIL opcode.
//! - [`op_info`] maps an opcode to its mnemonic and operand encoding.
//! - [`decode_il`] disassembles a body's IL bytes into [`Instruction`]s with
//!   branch targets resolved to absolute offsets.
//! - [`BodyBuilder`] assembles instructions back into a complete method
//!   body, resolving [`Label`]s and emitting exception handling sections.

mod decoder;
mod encoder;
mod instruction;
pub mod opcodes;

pub use decoder::decode_il;
pub use encoder::{BodyBuilder, EhHandler, Label};
pub use instruction::{op_info, Instruction, OpInfo, Operand, OperandKind};
