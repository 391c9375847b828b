//! Parsing of CIL method bodies: headers, code bounds and EH sections.
//!
//! Supports both body formats of ECMA-335 II.25.4: the tiny header for small
//! bodies without locals or handlers, and the 12 byte fat header with
//! optional exception handling data sections after the padded IL.

use crate::{
    file::io::{read_le, read_le_at},
    metadata::method::{
        ExceptionHandler, ExceptionHandlerFlags, MethodBodyFlags, SectionFlags,
    },
    Error::OutOfBounds,
    Result,
};

/// One method compiled to CIL, as read from the image.
///
/// `size_header` + `size_code` locate the IL bytes inside the slice the body
/// was parsed from; the EH clauses are fully decoded. Disassembling the IL
/// itself is [`crate::assembly::decode_il`]'s job.
pub struct MethodBody {
    /// Size of the IL code in bytes, not counting the header
    pub size_code: usize,
    /// Size of the method header in bytes, 1 or 12
    pub size_header: usize,
    /// Token of the StandAloneSig row holding the local variable signature,
    /// 0 when the method has no locals
    pub local_var_sig_token: u32,
    /// Maximum operand stack depth; 8 for tiny bodies
    pub max_stack: usize,
    /// True when the body uses the fat header
    pub is_fat: bool,
    /// True when locals are zero-initialised on entry
    pub is_init_local: bool,
    /// The decoded exception handling clauses, in section order
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Parse a method body starting at the first header byte.
    ///
    /// # Arguments
    /// * `data` - Slice beginning at the body header; may extend past the
    ///   body's end (section raw data usually does)
    ///
    /// # Errors
    /// Returns an error for empty input, truncated code or sections, and
    /// headers that are neither tiny nor fat.
    pub fn parse(data: &[u8]) -> Result<MethodBody> {
        if data.is_empty() {
            return Err(crate::Error::Empty);
        }

        let first_byte = read_le::<u8>(data)?;
        match first_byte & 0x03 {
            0x02 => {
                // Tiny: code size in the high six bits, fixed limits
                let size_code = (first_byte >> 2) as usize;
                if size_code + 1 > data.len() {
                    return Err(OutOfBounds);
                }

                Ok(MethodBody {
                    size_code,
                    size_header: 1,
                    local_var_sig_token: 0,
                    max_stack: 8,
                    is_fat: false,
                    is_init_local: false,
                    exception_handlers: Vec::new(),
                })
            }
            0x03 => {
                if data.len() < 12 {
                    return Err(OutOfBounds);
                }

                let first_duo = read_le::<u16>(data)?;
                let flags = MethodBodyFlags::from_bits_truncate(first_duo & 0x0FFF);
                let size_header = ((first_duo >> 12) * 4) as usize;
                let max_stack = read_le::<u16>(&data[2..])? as usize;
                let size_code = read_le::<u32>(&data[4..])? as usize;
                let local_var_sig_token = read_le::<u32>(&data[8..])?;

                if size_header < 12 || data.len() < size_header + size_code {
                    return Err(OutOfBounds);
                }

                let mut exception_handlers = Vec::new();
                if flags.contains(MethodBodyFlags::MORE_SECTS) {
                    let mut cursor = (size_header + size_code + 3) & !3;
                    exception_handlers = Self::parse_sections(data, &mut cursor)?;
                }

                Ok(MethodBody {
                    size_code,
                    size_header,
                    local_var_sig_token,
                    max_stack,
                    is_fat: true,
                    is_init_local: flags.contains(MethodBodyFlags::INIT_LOCALS),
                    exception_handlers,
                })
            }
            _ => Err(malformed_error!(
                "Method header is neither FAT nor TINY - {}",
                first_byte
            )),
        }
    }

    /// Walk the data sections after the padded IL (ECMA-335 II.25.4.5)
    fn parse_sections(data: &[u8], cursor: &mut usize) -> Result<Vec<ExceptionHandler>> {
        let mut handlers = Vec::new();

        loop {
            if data.len() < *cursor + 4 {
                return Err(OutOfBounds);
            }

            let section_flags = SectionFlags::from_bits_truncate(read_le::<u8>(&data[*cursor..])?);
            if !section_flags.contains(SectionFlags::EHTABLE) {
                return Err(malformed_error!(
                    "Method data section is not an EH table - {:?}",
                    section_flags
                ));
            }

            if section_flags.contains(SectionFlags::FAT_FORMAT) {
                let section_size = read_le::<u32>(&data[*cursor..])? >> 8;
                if section_size < 4 || data.len() < *cursor + section_size as usize {
                    return Err(OutOfBounds);
                }

                *cursor += 4;
                for _ in 0..(section_size - 4) / 24 {
                    #[allow(clippy::cast_possible_truncation)]
                    let raw_flags = read_le_at::<u32>(data, cursor)? as u16;
                    let flags = ExceptionHandlerFlags::from_bits_truncate(raw_flags);
                    let try_offset = read_le_at::<u32>(data, cursor)?;
                    let try_length = read_le_at::<u32>(data, cursor)?;
                    let handler_offset = read_le_at::<u32>(data, cursor)?;
                    let handler_length = read_le_at::<u32>(data, cursor)?;
                    let class_or_filter = read_le_at::<u32>(data, cursor)?;

                    handlers.push(build_handler(
                        flags,
                        try_offset,
                        try_length,
                        handler_offset,
                        handler_length,
                        class_or_filter,
                    ));
                }
            } else {
                let section_size = u32::from(read_le::<u8>(&data[*cursor + 1..])?);
                if section_size < 4 || data.len() < *cursor + section_size as usize {
                    return Err(OutOfBounds);
                }

                *cursor += 4;
                for _ in 0..(section_size - 4) / 12 {
                    let flags =
                        ExceptionHandlerFlags::from_bits_truncate(read_le_at::<u16>(data, cursor)?);
                    let try_offset = u32::from(read_le_at::<u16>(data, cursor)?);
                    let try_length = u32::from(read_le_at::<u8>(data, cursor)?);
                    let handler_offset = u32::from(read_le_at::<u16>(data, cursor)?);
                    let handler_length = u32::from(read_le_at::<u8>(data, cursor)?);
                    let class_or_filter = read_le_at::<u32>(data, cursor)?;

                    handlers.push(build_handler(
                        flags,
                        try_offset,
                        try_length,
                        handler_offset,
                        handler_length,
                        class_or_filter,
                    ));
                }
            }

            if !section_flags.contains(SectionFlags::MORE_SECTS) {
                break;
            }
            *cursor = (*cursor + 3) & !3;
        }

        Ok(handlers)
    }

    /// Total size of header plus code, without trailing sections
    #[must_use]
    pub fn size(&self) -> usize {
        self.size_code + self.size_header
    }

    /// The IL bytes of this body within the slice it was parsed from
    ///
    /// # Errors
    /// Returns [`OutOfBounds`] when the slice is shorter than the declared
    /// body, which indicates it is not the slice the body came from
    pub fn code<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        if data.len() < self.size_header + self.size_code {
            return Err(OutOfBounds);
        }
        Ok(&data[self.size_header..self.size_header + self.size_code])
    }
}

fn build_handler(
    flags: ExceptionHandlerFlags,
    try_offset: u32,
    try_length: u32,
    handler_offset: u32,
    handler_length: u32,
    class_or_filter: u32,
) -> ExceptionHandler {
    let is_filter = flags.contains(ExceptionHandlerFlags::FILTER);
    let is_typed = flags.bits() == ExceptionHandlerFlags::EXCEPTION.bits();

    ExceptionHandler {
        flags,
        try_offset,
        try_length,
        handler_offset,
        handler_length,
        class_token: if is_typed { class_or_filter } else { 0 },
        filter_offset: if is_filter { class_or_filter } else { 0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny() {
        // Tiny header: (3 << 2) | 0x02, three bytes of code (ldc.i4.1, pop, ret)
        let data = [0x0E, 0x17, 0x26, 0x2A];

        let body = MethodBody::parse(&data).unwrap();
        assert!(!body.is_fat);
        assert_eq!(body.size_header, 1);
        assert_eq!(body.size_code, 3);
        assert_eq!(body.max_stack, 8);
        assert_eq!(body.local_var_sig_token, 0);
        assert_eq!(body.code(&data).unwrap(), &[0x17, 0x26, 0x2A]);
    }

    #[test]
    fn fat() {
        #[rustfmt::skip]
        let data = [
            0x13, 0x30, // flags: fat | init_locals, header size 3 dwords
            0x02, 0x00, // max_stack = 2
            0x04, 0x00, 0x00, 0x00, // code size = 4
            0x01, 0x00, 0x00, 0x11, // local var sig token
            0x00, 0x17, 0x26, 0x2A, // code
        ];

        let body = MethodBody::parse(&data).unwrap();
        assert!(body.is_fat);
        assert!(body.is_init_local);
        assert_eq!(body.size_header, 12);
        assert_eq!(body.size_code, 4);
        assert_eq!(body.max_stack, 2);
        assert_eq!(body.local_var_sig_token, 0x1100_0001);
        assert!(body.exception_handlers.is_empty());
    }

    #[test]
    fn fat_with_small_eh_section() {
        #[rustfmt::skip]
        let data = [
            0x1B, 0x30, // flags: fat | init_locals | more_sects
            0x01, 0x00, // max_stack = 1
            0x04, 0x00, 0x00, 0x00, // code size = 4
            0x00, 0x00, 0x00, 0x00, // no locals
            0x00, 0x00, 0x00, 0x2A, // code (padded to 16 bytes total)
            // small EH section: kind 0x01, size 16, reserved
            0x01, 0x10, 0x00, 0x00,
            // one small clause: catch, try [0..2), handler [2..2)
            0x00, 0x00, // flags = EXCEPTION
            0x00, 0x00, // try_offset
            0x02,       // try_length
            0x02, 0x00, // handler_offset
            0x02,       // handler_length
            0x01, 0x00, 0x00, 0x01, // class token 0x01000001
        ];

        let body = MethodBody::parse(&data).unwrap();
        assert_eq!(body.exception_handlers.len(), 1);

        let handler = &body.exception_handlers[0];
        assert_eq!(handler.flags, ExceptionHandlerFlags::EXCEPTION);
        assert_eq!(handler.try_offset, 0);
        assert_eq!(handler.try_length, 2);
        assert_eq!(handler.handler_offset, 2);
        assert_eq!(handler.handler_length, 2);
        assert_eq!(handler.class_token, 0x0100_0001);
        assert_eq!(handler.filter_offset, 0);
    }

    #[test]
    fn rejects_invalid_header() {
        assert!(MethodBody::parse(&[]).is_err());
        assert!(MethodBody::parse(&[0x00]).is_err());
        // Tiny header declaring more code than present
        assert!(MethodBody::parse(&[0xFE]).is_err());
    }
}
