//! Element type constants and shared type-system primitives.
//!
//! The `ELEMENT_TYPE` namespace mirrors ECMA-335 II.23.1.16 — the byte tags
//! that introduce every type inside a signature blob.

/// ELEMENT_TYPE constants from ECMA-335 II.23.1.16
#[allow(non_snake_case, missing_docs)]
pub mod ELEMENT_TYPE {
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const PTR: u8 = 0x0F;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1B;
    pub const OBJECT: u8 = 0x1C;
    pub const SZARRAY: u8 = 0x1D;
    pub const MVAR: u8 = 0x1E;
    pub const CMOD_REQD: u8 = 0x1F;
    pub const CMOD_OPT: u8 = 0x20;
    pub const INTERNAL: u8 = 0x21;
    pub const MODIFIER: u8 = 0x40;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
}

/// Signature header bytes from ECMA-335 II.23.2
#[allow(non_snake_case, missing_docs)]
pub mod SIGNATURE {
    /// Field signature prolog
    pub const FIELD: u8 = 0x06;
    /// Local variable signature prolog
    pub const LOCAL_SIG: u8 = 0x07;
    /// Property signature base bit
    pub const PROPERTY: u8 = 0x08;
    /// MethodSpec generic instantiation prolog
    pub const GENERICINST: u8 = 0x0A;

    /// Calling convention kind mask
    pub const CALLCONV_MASK: u8 = 0x0F;
    pub const CALLCONV_DEFAULT: u8 = 0x00;
    pub const CALLCONV_C: u8 = 0x01;
    pub const CALLCONV_STDCALL: u8 = 0x02;
    pub const CALLCONV_THISCALL: u8 = 0x03;
    pub const CALLCONV_FASTCALL: u8 = 0x04;
    pub const CALLCONV_VARARG: u8 = 0x05;

    /// Method carries generic arity
    pub const GENERIC: u8 = 0x10;
    /// Instance method, `this` is passed
    pub const HASTHIS: u8 = 0x20;
    /// `this` is explicit in the parameter list
    pub const EXPLICITTHIS: u8 = 0x40;
}

/// One dimension of a general array: optional size and optional lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArrayDimension {
    /// Declared element count of this dimension, when present
    pub size: Option<u32>,
    /// Declared lower bound of this dimension, when present
    pub lower_bound: Option<u32>,
}
