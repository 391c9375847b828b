//! Exception handling clauses of fat method bodies.

use bitflags::bitflags;

bitflags! {
    /// Kind of one exception handling clause (ECMA-335 II.25.4.6)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// Typed exception handler (`catch`)
        const EXCEPTION = 0x0000;
        /// Filtered handler (`filter` / `endfilter`)
        const FILTER = 0x0001;
        /// Finally handler
        const FINALLY = 0x0002;
        /// Fault handler, runs on exceptional exit only
        const FAULT = 0x0004;
    }
}

bitflags! {
    /// Header flags of a method body (ECMA-335 II.25.4.4)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodBodyFlags: u16 {
        /// Tiny format marker (low two bits)
        const TINY_FORMAT = 0x0002;
        /// Fat format marker (low two bits)
        const FAT_FORMAT = 0x0003;
        /// One or more data sections follow the IL
        const MORE_SECTS = 0x0008;
        /// Zero-initialise all local variables
        const INIT_LOCALS = 0x0010;
    }
}

bitflags! {
    /// Flags of one data section following the IL (ECMA-335 II.25.4.5)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u8 {
        /// The section holds an exception handling table
        const EHTABLE = 0x01;
        /// Reserved OptILTable marker
        const OPT_IL_TABLE = 0x02;
        /// The section uses the fat (32 bit) layout
        const FAT_FORMAT = 0x40;
        /// Another section follows this one
        const MORE_SECTS = 0x80;
    }
}

/// One decoded exception handling clause.
///
/// Offsets and lengths are in bytes relative to the start of the IL stream.
/// For `EXCEPTION` clauses `class_token` names the caught type; for `FILTER`
/// clauses `filter_offset` locates the filter IL; both are 0 otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Kind of the clause
    pub flags: ExceptionHandlerFlags,
    /// Start of the protected range
    pub try_offset: u32,
    /// Length of the protected range
    pub try_length: u32,
    /// Start of the handler
    pub handler_offset: u32,
    /// Length of the handler
    pub handler_length: u32,
    /// Token of the caught exception type (EXCEPTION clauses)
    pub class_token: u32,
    /// IL offset of the filter block (FILTER clauses)
    pub filter_offset: u32,
}
