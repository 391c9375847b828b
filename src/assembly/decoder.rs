//! CIL instruction stream decoder.
//!
//! [`decode_il`] turns the raw IL bytes of a method body into a vector of
//! [`Instruction`] values. Relative branch operands are resolved to absolute
//! IL offsets during decoding, so instructions can be inspected, filtered
//! and re-assembled without manual offset arithmetic.

use crate::{
    assembly::{
        instruction::{op_info, Instruction, Operand, OperandKind},
        opcodes::FE_PREFIX,
    },
    file::parser::Parser,
    metadata::token::Token,
    Error::InvalidOpcode,
    Result,
};

/// Decode an IL byte stream into instructions.
///
/// ## Arguments
/// * 'code' - Exactly the IL bytes of one method body, header excluded
///
/// # Errors
/// Returns [`InvalidOpcode`] for unknown opcode bytes,
/// [`crate::Error::OutOfBounds`] for operands truncated by the end of the
/// stream, and [`crate::Error::Malformed`] for branch targets leaving the
/// method.
///
/// # Example
///
/// ```rust
/// use cilforge::assembly::decode_il;
///
/// // ldc.i4.1; pop; ret
/// let code = [0x17, 0x26, 0x2A];
/// let instructions = decode_il(&code)?;
/// assert_eq!(instructions.len(), 3);
/// assert_eq!(instructions[1].mnemonic, "pop");
/// # Ok::<(), cilforge::Error>(())
/// ```
pub fn decode_il(code: &[u8]) -> Result<Vec<Instruction>> {
    let mut parser = Parser::new(code);
    let mut instructions = Vec::new();

    while parser.has_more_data() {
        #[allow(clippy::cast_possible_truncation)]
        let start = parser.pos() as u32;

        let first = parser.read_le::<u8>()?;
        let opcode = if first == FE_PREFIX {
            0xFE00 | u16::from(parser.read_le::<u8>()?)
        } else {
            u16::from(first)
        };

        let Some(info) = op_info(opcode) else {
            return Err(InvalidOpcode(opcode));
        };

        let operand = read_operand(&mut parser, info.kind, code.len())?;

        #[allow(clippy::cast_possible_truncation)]
        let size = parser.pos() as u32 - start;

        // Branch operands become absolute offsets, anchored past the operand
        let operand = match (info.kind, operand) {
            (OperandKind::ShortBranch | OperandKind::Branch, Operand::Int32(relative)) => {
                Operand::Target(resolve_target(start + size, relative, code.len())?)
            }
            (_, other) => other,
        };

        instructions.push(Instruction {
            offset: start,
            opcode,
            mnemonic: info.mnemonic,
            operand,
            size,
        });
    }

    Ok(instructions)
}

fn read_operand(parser: &mut Parser<'_>, kind: OperandKind, code_len: usize) -> Result<Operand> {
    Ok(match kind {
        OperandKind::None => Operand::None,
        OperandKind::ShortVar => Operand::UInt8(parser.read_le::<u8>()?),
        OperandKind::Var => Operand::UInt16(parser.read_le::<u16>()?),
        OperandKind::ShortI => Operand::Int8(parser.read_le::<i8>()?),
        OperandKind::I => Operand::Int32(parser.read_le::<i32>()?),
        OperandKind::I8 => Operand::Int64(parser.read_le::<i64>()?),
        OperandKind::ShortR => Operand::Float32(parser.read_le::<f32>()?),
        OperandKind::R => Operand::Float64(parser.read_le::<f64>()?),
        OperandKind::ShortBranch => Operand::Int32(i32::from(parser.read_le::<i8>()?)),
        OperandKind::Branch => Operand::Int32(parser.read_le::<i32>()?),
        OperandKind::Method
        | OperandKind::Field
        | OperandKind::Type
        | OperandKind::String
        | OperandKind::Sig
        | OperandKind::Tok => Operand::Token(Token::new(parser.read_le::<u32>()?)),
        OperandKind::Switch => {
            let count = parser.read_le::<u32>()?;
            let mut relatives = Vec::with_capacity(count as usize);
            for _ in 0..count {
                relatives.push(parser.read_le::<i32>()?);
            }

            // The base is the offset after the full jump table
            #[allow(clippy::cast_possible_truncation)]
            let base = parser.pos() as u32;
            let mut targets = Vec::with_capacity(relatives.len());
            for relative in relatives {
                targets.push(resolve_target(base, relative, code_len)?);
            }
            Operand::Switch(targets)
        }
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn resolve_target(base: u32, relative: i32, code_len: usize) -> Result<u32> {
    let target = i64::from(base) + i64::from(relative);
    if target < 0 || target > code_len as i64 {
        return Err(malformed_error!(
            "Branch target {} leaves the method (code size {})",
            target,
            code_len
        ));
    }
    Ok(target as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line() {
        // ldstr 0x70000001; call 0x0A000001; ret
        #[rustfmt::skip]
        let code = [
            0x72, 0x01, 0x00, 0x00, 0x70,
            0x28, 0x01, 0x00, 0x00, 0x0A,
            0x2A,
        ];

        let instructions = decode_il(&code).unwrap();
        assert_eq!(instructions.len(), 3);

        assert_eq!(instructions[0].mnemonic, "ldstr");
        assert_eq!(
            instructions[0].operand,
            Operand::Token(Token::new(0x7000_0001))
        );
        assert_eq!(instructions[0].size, 5);

        assert_eq!(instructions[1].mnemonic, "call");
        assert_eq!(instructions[1].offset, 5);

        assert_eq!(instructions[2].mnemonic, "ret");
        assert_eq!(instructions[2].offset, 10);
        assert_eq!(instructions[2].size, 1);
    }

    #[test]
    fn short_branch_targets_become_absolute() {
        // br.s +1; nop; ret  -> branch target is the ret at offset 3
        let code = [0x2B, 0x01, 0x00, 0x2A];
        let instructions = decode_il(&code).unwrap();

        assert_eq!(instructions[0].mnemonic, "br.s");
        assert_eq!(instructions[0].operand, Operand::Target(3));
    }

    #[test]
    fn backward_branch() {
        // nop; br.s -3 -> back to offset 0
        let code = [0x00, 0x2B, 0xFD, 0x2A];
        let instructions = decode_il(&code).unwrap();
        assert_eq!(instructions[1].operand, Operand::Target(0));
    }

    #[test]
    fn switch_table() {
        // switch [2 targets]; then two rets
        #[rustfmt::skip]
        let code = [
            0x45,
            0x02, 0x00, 0x00, 0x00, // count = 2
            0x00, 0x00, 0x00, 0x00, // +0 -> offset 13
            0x01, 0x00, 0x00, 0x00, // +1 -> offset 14
            0x2A, 0x2A,
        ];

        let instructions = decode_il(&code).unwrap();
        assert_eq!(instructions[0].mnemonic, "switch");
        assert_eq!(instructions[0].operand, Operand::Switch(vec![13, 14]));
        assert_eq!(instructions[0].size, 13);
    }

    #[test]
    fn two_byte_opcodes() {
        // ldc.i4.1; ldc.i4.1; ceq; pop; ret
        let code = [0x17, 0x17, 0xFE, 0x01, 0x26, 0x2A];
        let instructions = decode_il(&code).unwrap();
        assert_eq!(instructions[2].mnemonic, "ceq");
        assert_eq!(instructions[2].opcode, 0xFE01);
        assert_eq!(instructions[2].size, 2);
    }

    #[test]
    fn unknown_opcode() {
        assert!(matches!(decode_il(&[0xA8]), Err(InvalidOpcode(0x00A8))));
        assert!(matches!(
            decode_il(&[0xFE, 0x30]),
            Err(InvalidOpcode(0xFE30))
        ));
    }

    #[test]
    fn branch_out_of_method() {
        // br.s +100 runs past the end of the two byte method
        let code = [0x2B, 0x64];
        assert!(decode_il(&code).is_err());
    }

    #[test]
    fn truncated_operand() {
        // ldc.i4 with only two of four operand bytes
        let code = [0x20, 0x01, 0x02];
        assert!(decode_il(&code).is_err());
    }
}
