//! Method body assembler with label-based branch resolution.
//!
//! [`BodyBuilder`] collects instructions whose branch operands reference
//! [`Label`]s instead of byte offsets. A body moves through three states:
//! assembling (instructions and labels are added), resolved (every label is
//! bound to an offset) and serialised (bytes produced). Serialisation picks
//! the tiny header when the body qualifies, appends exception handling
//! sections in the small form when every clause fits, and fails on any label
//! that was never bound.

use crate::{
    assembly::{
        instruction::{op_info, OperandKind},
        opcodes,
    },
    metadata::{method::ExceptionHandlerFlags, token::Token},
    Error::UnresolvedLabel,
    Result,
};

/// A branch target handle, bound to an IL offset via [`BodyBuilder::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) u32);

/// Operand of one instruction under assembly.
#[derive(Debug, Clone)]
enum BuildOperand {
    None,
    Int8(i8),
    UInt8(u8),
    UInt16(u16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Token(Token),
    Branch(Label),
    Switch(Vec<Label>),
}

/// Handler kind of one exception clause under assembly.
#[derive(Debug, Clone, Copy)]
pub enum EhHandler {
    /// Typed handler catching the type named by the token
    Catch(Token),
    /// Filtered handler; the label marks the filter block start
    Filter(Label),
    /// Finally handler
    Finally,
    /// Fault handler
    Fault,
}

/// One exception clause under assembly, ranges given as labels.
#[derive(Debug, Clone, Copy)]
struct EhClauseSpec {
    handler: EhHandler,
    try_start: Label,
    try_end: Label,
    handler_start: Label,
    handler_end: Label,
}

/// Small-form EH limits: offsets u16, lengths u8, section size u8.
const SMALL_EH_MAX_CLAUSES: usize = 20;

/// Assembles one method body: instructions, labels, locals and EH clauses.
///
/// # Example
///
/// ```rust
/// use cilforge::assembly::{opcodes, BodyBuilder};
/// use cilforge::Token;
///
/// let mut body = BodyBuilder::new();
/// body.emit_token(opcodes::wide(opcodes::LDSTR), Token::new(0x7000_0001))?;
/// body.emit_token(opcodes::wide(opcodes::CALL), Token::new(0x0A00_0001))?;
/// body.emit(opcodes::wide(opcodes::RET))?;
/// let bytes = body.serialize()?;
/// assert_eq!(bytes[0] & 0x03, 0x02); // tiny header
/// # Ok::<(), cilforge::Error>(())
/// ```
pub struct BodyBuilder {
    instructions: Vec<(u16, BuildOperand)>,
    bindings: Vec<Option<usize>>,
    max_stack: u16,
    local_var_sig: Token,
    init_locals: bool,
    clauses: Vec<EhClauseSpec>,
    serialised: bool,
}

impl Default for BodyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyBuilder {
    /// Create an empty body in the assembling state.
    ///
    /// Max stack defaults to 8, the depth the tiny format implies; locals
    /// are absent until [`BodyBuilder::set_local_var_sig`] is called.
    #[must_use]
    pub fn new() -> Self {
        BodyBuilder {
            instructions: Vec::new(),
            bindings: Vec::new(),
            max_stack: 8,
            local_var_sig: Token::new(0),
            init_locals: false,
            clauses: Vec::new(),
            serialised: false,
        }
    }

    /// Create a fresh, unbound label
    #[allow(clippy::cast_possible_truncation)]
    pub fn label(&mut self) -> Label {
        self.bindings.push(None);
        Label(self.bindings.len() as u32 - 1)
    }

    /// Bind a label to the current position: the next emitted instruction,
    /// or the end of the code when nothing follows.
    ///
    /// # Errors
    /// Returns an error when the label is already bound or the body is
    /// already serialised
    pub fn bind(&mut self, label: Label) -> Result<()> {
        self.check_assembling()?;
        let slot = self
            .bindings
            .get_mut(label.0 as usize)
            .ok_or(UnresolvedLabel(label.0))?;
        if slot.is_some() {
            return Err(crate::Error::ContractViolation("label bound twice"));
        }
        *slot = Some(self.instructions.len());
        Ok(())
    }

    /// Set the maximum operand stack depth of the fat header
    pub fn set_max_stack(&mut self, max_stack: u16) {
        self.max_stack = max_stack;
    }

    /// Attach the StandAloneSig token of the local variable signature
    pub fn set_local_var_sig(&mut self, token: Token) {
        self.local_var_sig = token;
        self.init_locals = true;
    }

    /// Control zero-initialisation of locals (`INIT_LOCALS`)
    pub fn set_init_locals(&mut self, init: bool) {
        self.init_locals = init;
    }

    /// Append an operand-less instruction
    ///
    /// # Errors
    /// Returns an error when the opcode is unknown or expects an operand
    pub fn emit(&mut self, opcode: u16) -> Result<()> {
        self.push(opcode, OperandKind::None, BuildOperand::None)
    }

    /// Append an instruction with a signed 8 bit immediate
    ///
    /// # Errors
    /// Returns an error when the opcode does not take this operand
    pub fn emit_i1(&mut self, opcode: u16, value: i8) -> Result<()> {
        self.push(opcode, OperandKind::ShortI, BuildOperand::Int8(value))
    }

    /// Append an instruction with an 8 bit variable index
    ///
    /// # Errors
    /// Returns an error when the opcode does not take this operand
    pub fn emit_var_s(&mut self, opcode: u16, index: u8) -> Result<()> {
        self.push(opcode, OperandKind::ShortVar, BuildOperand::UInt8(index))
    }

    /// Append an instruction with a 16 bit variable index
    ///
    /// # Errors
    /// Returns an error when the opcode does not take this operand
    pub fn emit_var(&mut self, opcode: u16, index: u16) -> Result<()> {
        self.push(opcode, OperandKind::Var, BuildOperand::UInt16(index))
    }

    /// Append an instruction with a signed 32 bit immediate
    ///
    /// # Errors
    /// Returns an error when the opcode does not take this operand
    pub fn emit_i4(&mut self, opcode: u16, value: i32) -> Result<()> {
        self.push(opcode, OperandKind::I, BuildOperand::Int32(value))
    }

    /// Append an instruction with a signed 64 bit immediate
    ///
    /// # Errors
    /// Returns an error when the opcode does not take this operand
    pub fn emit_i8(&mut self, opcode: u16, value: i64) -> Result<()> {
        self.push(opcode, OperandKind::I8, BuildOperand::Int64(value))
    }

    /// Append an instruction with a 32 bit float immediate
    ///
    /// # Errors
    /// Returns an error when the opcode does not take this operand
    pub fn emit_r4(&mut self, opcode: u16, value: f32) -> Result<()> {
        self.push(opcode, OperandKind::ShortR, BuildOperand::Float32(value))
    }

    /// Append an instruction with a 64 bit float immediate
    ///
    /// # Errors
    /// Returns an error when the opcode does not take this operand
    pub fn emit_r8(&mut self, opcode: u16, value: f64) -> Result<()> {
        self.push(opcode, OperandKind::R, BuildOperand::Float64(value))
    }

    /// Append an instruction carrying a metadata token
    ///
    /// # Errors
    /// Returns an error when the opcode does not take a token operand
    pub fn emit_token(&mut self, opcode: u16, token: Token) -> Result<()> {
        self.check_assembling()?;
        let info = op_info(opcode).ok_or(crate::Error::InvalidOpcode(opcode))?;
        if !info.kind.is_token() {
            return Err(malformed_error!(
                "Opcode {} does not take a token operand",
                info.mnemonic
            ));
        }
        self.instructions.push((opcode, BuildOperand::Token(token)));
        Ok(())
    }

    /// Append a branch to a label
    ///
    /// # Errors
    /// Returns an error when the opcode is not a branch
    pub fn emit_branch(&mut self, opcode: u16, target: Label) -> Result<()> {
        self.check_assembling()?;
        let info = op_info(opcode).ok_or(crate::Error::InvalidOpcode(opcode))?;
        if !matches!(info.kind, OperandKind::Branch | OperandKind::ShortBranch) {
            return Err(malformed_error!(
                "Opcode {} is not a branch instruction",
                info.mnemonic
            ));
        }
        self.instructions.push((opcode, BuildOperand::Branch(target)));
        Ok(())
    }

    /// Append a `switch` over a jump table of labels
    ///
    /// # Errors
    /// Returns an error when the body is already serialised
    pub fn emit_switch(&mut self, targets: Vec<Label>) -> Result<()> {
        self.check_assembling()?;
        self.instructions.push((
            opcodes::wide(opcodes::SWITCH),
            BuildOperand::Switch(targets),
        ));
        Ok(())
    }

    /// Add a `catch` clause over the given label ranges
    pub fn add_catch(
        &mut self,
        try_start: Label,
        try_end: Label,
        handler_start: Label,
        handler_end: Label,
        class_token: Token,
    ) {
        self.clauses.push(EhClauseSpec {
            handler: EhHandler::Catch(class_token),
            try_start,
            try_end,
            handler_start,
            handler_end,
        });
    }

    /// Add a `finally` clause over the given label ranges
    pub fn add_finally(
        &mut self,
        try_start: Label,
        try_end: Label,
        handler_start: Label,
        handler_end: Label,
    ) {
        self.clauses.push(EhClauseSpec {
            handler: EhHandler::Finally,
            try_start,
            try_end,
            handler_start,
            handler_end,
        });
    }

    /// Add a `fault` clause over the given label ranges
    pub fn add_fault(
        &mut self,
        try_start: Label,
        try_end: Label,
        handler_start: Label,
        handler_end: Label,
    ) {
        self.clauses.push(EhClauseSpec {
            handler: EhHandler::Fault,
            try_start,
            try_end,
            handler_start,
            handler_end,
        });
    }

    /// Add a `filter` clause; `filter_start` marks the filter block
    pub fn add_filter(
        &mut self,
        try_start: Label,
        try_end: Label,
        handler_start: Label,
        handler_end: Label,
        filter_start: Label,
    ) {
        self.clauses.push(EhClauseSpec {
            handler: EhHandler::Filter(filter_start),
            try_start,
            try_end,
            handler_start,
            handler_end,
        });
    }

    /// Number of instructions assembled so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True when no instruction has been assembled
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    fn check_assembling(&self) -> Result<()> {
        if self.serialised {
            return Err(crate::Error::ContractViolation(
                "method body mutated after serialisation",
            ));
        }
        Ok(())
    }

    fn push(&mut self, opcode: u16, expected: OperandKind, operand: BuildOperand) -> Result<()> {
        self.check_assembling()?;
        let info = op_info(opcode).ok_or(crate::Error::InvalidOpcode(opcode))?;
        if info.kind != expected {
            return Err(malformed_error!(
                "Opcode {} takes a {:?} operand",
                info.mnemonic,
                info.kind
            ));
        }
        self.instructions.push((opcode, operand));
        Ok(())
    }

    fn instruction_size(opcode: u16, operand: &BuildOperand) -> u32 {
        let opcode_size = if opcode > 0xFF { 2 } else { 1 };
        let operand_size = match operand {
            BuildOperand::None => 0,
            BuildOperand::Int8(_) | BuildOperand::UInt8(_) => 1,
            BuildOperand::UInt16(_) => 2,
            BuildOperand::Int32(_) | BuildOperand::Float32(_) | BuildOperand::Token(_) => 4,
            BuildOperand::Int64(_) | BuildOperand::Float64(_) => 8,
            BuildOperand::Branch(_) => {
                let kind = op_info(opcode).map(|info| info.kind);
                if kind == Some(OperandKind::ShortBranch) {
                    1
                } else {
                    4
                }
            }
            #[allow(clippy::cast_possible_truncation)]
            BuildOperand::Switch(targets) => 4 + 4 * targets.len() as u32,
        };
        opcode_size + operand_size
    }

    /// Resolve every label and produce the complete body bytes: header, IL,
    /// and exception handling sections.
    ///
    /// Picks the tiny header when the body has no locals, no clauses, a max
    /// stack of at most 8 and less than 64 code bytes; the EH sections use
    /// the small form unless any clause field exceeds its range or more than
    /// 20 clauses exist.
    ///
    /// # Errors
    /// Returns [`UnresolvedLabel`] for labels that were never bound and
    /// [`crate::Error::Malformed`] for short branches whose distance does
    /// not fit 8 bits.
    pub fn serialize(&mut self) -> Result<Vec<u8>> {
        self.check_assembling()?;
        self.serialised = true;

        // Phase 1: fix instruction offsets
        let mut offsets = Vec::with_capacity(self.instructions.len() + 1);
        let mut cursor = 0u32;
        for (opcode, operand) in &self.instructions {
            offsets.push(cursor);
            cursor += Self::instruction_size(*opcode, operand);
        }
        offsets.push(cursor);
        let code_size = cursor;

        // Phase 2: bind labels to offsets
        let resolve = |label: Label| -> Result<u32> {
            match self.bindings.get(label.0 as usize) {
                Some(Some(index)) => Ok(offsets[*index]),
                _ => Err(UnresolvedLabel(label.0)),
            }
        };

        // Phase 3: code bytes
        let mut code = Vec::with_capacity(code_size as usize);
        for (index, (opcode, operand)) in self.instructions.iter().enumerate() {
            if *opcode > 0xFF {
                code.push(opcodes::FE_PREFIX);
            }
            #[allow(clippy::cast_possible_truncation)]
            code.push(*opcode as u8);

            let next_offset = offsets[index + 1];
            match operand {
                BuildOperand::None => {}
                BuildOperand::Int8(value) => code.push(value.to_le_bytes()[0]),
                BuildOperand::UInt8(value) => code.push(*value),
                BuildOperand::UInt16(value) => code.extend_from_slice(&value.to_le_bytes()),
                BuildOperand::Int32(value) => code.extend_from_slice(&value.to_le_bytes()),
                BuildOperand::Int64(value) => code.extend_from_slice(&value.to_le_bytes()),
                BuildOperand::Float32(value) => code.extend_from_slice(&value.to_le_bytes()),
                BuildOperand::Float64(value) => code.extend_from_slice(&value.to_le_bytes()),
                BuildOperand::Token(token) => {
                    code.extend_from_slice(&token.value().to_le_bytes());
                }
                BuildOperand::Branch(label) => {
                    let target = resolve(*label)?;
                    let relative = i64::from(target) - i64::from(next_offset);
                    let is_short = op_info(*opcode)
                        .map(|info| info.kind == OperandKind::ShortBranch)
                        .unwrap_or(false);
                    if is_short {
                        let narrow = i8::try_from(relative).map_err(|_| {
                            malformed_error!(
                                "Short branch distance {} does not fit 8 bits",
                                relative
                            )
                        })?;
                        code.push(narrow.to_le_bytes()[0]);
                    } else {
                        #[allow(clippy::cast_possible_truncation)]
                        code.extend_from_slice(&(relative as i32).to_le_bytes());
                    }
                }
                BuildOperand::Switch(targets) => {
                    #[allow(clippy::cast_possible_truncation)]
                    code.extend_from_slice(&(targets.len() as u32).to_le_bytes());
                    for label in targets {
                        let target = resolve(*label)?;
                        let relative = i64::from(target) - i64::from(next_offset);
                        #[allow(clippy::cast_possible_truncation)]
                        code.extend_from_slice(&(relative as i32).to_le_bytes());
                    }
                }
            }
        }
        debug_assert_eq!(code.len(), code_size as usize);

        // Phase 4: resolve EH clause ranges
        struct ResolvedClause {
            flags: u16,
            try_offset: u32,
            try_length: u32,
            handler_offset: u32,
            handler_length: u32,
            class_or_filter: u32,
        }

        let mut resolved_clauses = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            let try_offset = resolve(clause.try_start)?;
            let try_end = resolve(clause.try_end)?;
            let handler_offset = resolve(clause.handler_start)?;
            let handler_end = resolve(clause.handler_end)?;

            let (flags, class_or_filter) = match clause.handler {
                EhHandler::Catch(token) => {
                    (ExceptionHandlerFlags::EXCEPTION.bits(), token.value())
                }
                EhHandler::Filter(filter) => {
                    (ExceptionHandlerFlags::FILTER.bits(), resolve(filter)?)
                }
                EhHandler::Finally => (ExceptionHandlerFlags::FINALLY.bits(), 0),
                EhHandler::Fault => (ExceptionHandlerFlags::FAULT.bits(), 0),
            };

            resolved_clauses.push(ResolvedClause {
                flags,
                try_offset,
                try_length: try_end.saturating_sub(try_offset),
                handler_offset,
                handler_length: handler_end.saturating_sub(handler_offset),
                class_or_filter,
            });
        }

        // Phase 5: pick the header format and lay out the bytes
        let is_tiny = code_size < 64
            && self.local_var_sig.is_null()
            && self.max_stack <= 8
            && resolved_clauses.is_empty();

        let mut body = Vec::new();
        if is_tiny {
            #[allow(clippy::cast_possible_truncation)]
            body.push(((code_size as u8) << 2) | 0x02);
            body.extend_from_slice(&code);
            return Ok(body);
        }

        let mut flags: u16 = 0x3003; // fat, header size 3 dwords
        if self.init_locals {
            flags |= 0x0010;
        }
        if !resolved_clauses.is_empty() {
            flags |= 0x0008;
        }

        body.extend_from_slice(&flags.to_le_bytes());
        body.extend_from_slice(&self.max_stack.to_le_bytes());
        body.extend_from_slice(&code_size.to_le_bytes());
        body.extend_from_slice(&self.local_var_sig.value().to_le_bytes());
        body.extend_from_slice(&code);

        if !resolved_clauses.is_empty() {
            while body.len() % 4 != 0 {
                body.push(0);
            }

            let use_fat = resolved_clauses.len() > SMALL_EH_MAX_CLAUSES
                || resolved_clauses.iter().any(|clause| {
                    clause.try_offset > 0xFFFF
                        || clause.handler_offset > 0xFFFF
                        || clause.try_length > 0xFF
                        || clause.handler_length > 0xFF
                });

            if use_fat {
                let section_size = resolved_clauses.len() as u32 * 24 + 4;
                body.push(0x41); // EHTABLE | FAT_FORMAT
                body.extend_from_slice(&section_size.to_le_bytes()[..3]);
                for clause in &resolved_clauses {
                    body.extend_from_slice(&u32::from(clause.flags).to_le_bytes());
                    body.extend_from_slice(&clause.try_offset.to_le_bytes());
                    body.extend_from_slice(&clause.try_length.to_le_bytes());
                    body.extend_from_slice(&clause.handler_offset.to_le_bytes());
                    body.extend_from_slice(&clause.handler_length.to_le_bytes());
                    body.extend_from_slice(&clause.class_or_filter.to_le_bytes());
                }
            } else {
                #[allow(clippy::cast_possible_truncation)]
                let section_size = (resolved_clauses.len() * 12 + 4) as u8;
                body.push(0x01); // EHTABLE
                body.push(section_size);
                body.extend_from_slice(&[0, 0]); // reserved
                for clause in &resolved_clauses {
                    #[allow(clippy::cast_possible_truncation)]
                    {
                        body.extend_from_slice(&clause.flags.to_le_bytes());
                        body.extend_from_slice(&(clause.try_offset as u16).to_le_bytes());
                        body.push(clause.try_length as u8);
                        body.extend_from_slice(&(clause.handler_offset as u16).to_le_bytes());
                        body.push(clause.handler_length as u8);
                        body.extend_from_slice(&clause.class_or_filter.to_le_bytes());
                    }
                }
            }
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assembly::decoder::decode_il, metadata::method::MethodBody};

    #[test]
    fn tiny_body() {
        let mut body = BodyBuilder::new();
        body.emit(opcodes::wide(opcodes::LDC_I4_1)).unwrap();
        body.emit(opcodes::wide(opcodes::POP)).unwrap();
        body.emit(opcodes::wide(opcodes::RET)).unwrap();

        let bytes = body.serialize().unwrap();
        assert_eq!(bytes, vec![(3 << 2) | 0x02, 0x17, 0x26, 0x2A]);

        let parsed = MethodBody::parse(&bytes).unwrap();
        assert!(!parsed.is_fat);
        assert_eq!(parsed.size_code, 3);
    }

    #[test]
    fn forward_branch_resolution() {
        let mut body = BodyBuilder::new();
        let skip = body.label();
        body.emit_branch(opcodes::wide(opcodes::BR_S), skip).unwrap();
        body.emit(opcodes::wide(opcodes::NOP)).unwrap();
        body.bind(skip).unwrap();
        body.emit(opcodes::wide(opcodes::RET)).unwrap();

        let bytes = body.serialize().unwrap();
        // br.s +1 skips the nop
        assert_eq!(&bytes[1..], &[0x2B, 0x01, 0x00, 0x2A]);

        let instructions = decode_il(&bytes[1..]).unwrap();
        assert_eq!(
            instructions[0].operand,
            crate::assembly::Operand::Target(3)
        );
    }

    #[test]
    fn backward_branch_resolution() {
        let mut body = BodyBuilder::new();
        let top = body.label();
        body.bind(top).unwrap();
        body.emit(opcodes::wide(opcodes::NOP)).unwrap();
        body.emit_branch(opcodes::wide(opcodes::BR_S), top).unwrap();

        let bytes = body.serialize().unwrap();
        // br.s back over itself and the nop: -3
        assert_eq!(&bytes[1..], &[0x00, 0x2B, 0xFD]);
    }

    #[test]
    fn long_branch_and_switch() {
        let mut body = BodyBuilder::new();
        let end = body.label();
        let case0 = body.label();

        body.emit(opcodes::wide(opcodes::LDC_I4_0)).unwrap();
        body.emit_switch(vec![case0]).unwrap();
        body.emit_branch(opcodes::wide(opcodes::BR), end).unwrap();
        body.bind(case0).unwrap();
        body.emit(opcodes::wide(opcodes::NOP)).unwrap();
        body.bind(end).unwrap();
        body.emit(opcodes::wide(opcodes::RET)).unwrap();

        let bytes = body.serialize().unwrap();
        let instructions = decode_il(&bytes[1..]).unwrap();

        // switch at 1, table size 1: next offset 10; case0 lands on the nop
        assert_eq!(
            instructions[1].operand,
            crate::assembly::Operand::Switch(vec![15])
        );
        assert_eq!(
            instructions[2].operand,
            crate::assembly::Operand::Target(16)
        );
    }

    #[test]
    fn unresolved_label_is_fatal() {
        let mut body = BodyBuilder::new();
        let never_bound = body.label();
        body.emit_branch(opcodes::wide(opcodes::BR_S), never_bound)
            .unwrap();

        assert!(matches!(body.serialize(), Err(UnresolvedLabel(0))));
    }

    #[test]
    fn short_branch_out_of_range() {
        let mut body = BodyBuilder::new();
        let far = body.label();
        body.emit_branch(opcodes::wide(opcodes::BR_S), far).unwrap();
        for _ in 0..200 {
            body.emit(opcodes::wide(opcodes::NOP)).unwrap();
        }
        body.bind(far).unwrap();
        body.emit(opcodes::wide(opcodes::RET)).unwrap();

        assert!(body.serialize().is_err());
    }

    #[test]
    fn fat_body_with_locals() {
        let mut body = BodyBuilder::new();
        body.set_local_var_sig(Token::new(0x1100_0001));
        body.set_max_stack(2);
        body.emit(opcodes::wide(opcodes::LDC_I4_1)).unwrap();
        body.emit(opcodes::wide(opcodes::STLOC_0)).unwrap();
        body.emit(opcodes::wide(opcodes::RET)).unwrap();

        let bytes = body.serialize().unwrap();
        let parsed = MethodBody::parse(&bytes).unwrap();
        assert!(parsed.is_fat);
        assert!(parsed.is_init_local);
        assert_eq!(parsed.max_stack, 2);
        assert_eq!(parsed.local_var_sig_token, 0x1100_0001);
        assert_eq!(parsed.size_code, 3);
    }

    #[test]
    fn eh_clauses_round_trip() {
        let mut body = BodyBuilder::new();
        body.set_max_stack(9); // force the fat header without locals

        let try_start = body.label();
        let try_end = body.label();
        let catch_start = body.label();
        let catch_end = body.label();
        let finally_start = body.label();
        let finally_end = body.label();
        let done = body.label();

        body.bind(try_start).unwrap();
        body.emit(opcodes::wide(opcodes::NOP)).unwrap();
        body.emit_branch(opcodes::wide(opcodes::LEAVE_S), done).unwrap();
        body.bind(try_end).unwrap();
        body.bind(catch_start).unwrap();
        body.emit(opcodes::wide(opcodes::POP)).unwrap();
        body.emit_branch(opcodes::wide(opcodes::LEAVE_S), done).unwrap();
        body.bind(catch_end).unwrap();
        body.bind(finally_start).unwrap();
        body.emit(opcodes::wide(opcodes::ENDFINALLY)).unwrap();
        body.bind(finally_end).unwrap();
        body.bind(done).unwrap();
        body.emit(opcodes::wide(opcodes::RET)).unwrap();

        body.add_catch(
            try_start,
            try_end,
            catch_start,
            catch_end,
            Token::new(0x0100_0001),
        );
        body.add_finally(try_start, try_end, finally_start, finally_end);

        let bytes = body.serialize().unwrap();
        let parsed = MethodBody::parse(&bytes).unwrap();

        assert_eq!(parsed.exception_handlers.len(), 2);
        let catch = &parsed.exception_handlers[0];
        assert_eq!(catch.flags, ExceptionHandlerFlags::EXCEPTION);
        assert_eq!(catch.try_offset, 0);
        assert_eq!(catch.try_length, 3);
        assert_eq!(catch.handler_offset, 3);
        assert_eq!(catch.class_token, 0x0100_0001);

        let finally = &parsed.exception_handlers[1];
        assert_eq!(finally.flags, ExceptionHandlerFlags::FINALLY);
        assert_eq!(finally.try_offset, 0);
        assert_eq!(finally.try_length, 3);
        assert_eq!(finally.handler_offset, 6);
        assert_eq!(finally.handler_length, 1);
    }
}
