//! CLR 2.0 (Cor20) header for .NET assemblies.
//!
//! The [`Cor20Header`] lives at the start of the `IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR`
//! data directory of a PE file and anchors everything CLI: the metadata root,
//! runtime flags and the entry point token.
//!
//! # Reference
//! - [ECMA-335 II.25.3.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// Runtime flag: the image contains only IL code
pub const COMIMAGE_FLAGS_ILONLY: u32 = 0x0000_0001;
/// Runtime flag: the image requires a 32-bit process
pub const COMIMAGE_FLAGS_32BITREQUIRED: u32 = 0x0000_0002;
/// Runtime flag: the image is strong-name signed
pub const COMIMAGE_FLAGS_STRONGNAMESIGNED: u32 = 0x0000_0008;

/// The main CLI header, located at the beginning of the COM descriptor
/// data directory.
///
/// Contains all fields defined by ECMA-335 for the CLR 2.0 header. The fields
/// this engine consumes are the metadata directory, the flags and the entry
/// point token; the rest round-trips untouched.
pub struct Cor20Header {
    /// Size of header in bytes, always 72
    pub cb: u32,
    /// The minimum major runtime version required to run this program
    pub major_runtime_version: u16,
    /// The minor portion of the version
    pub minor_runtime_version: u16,
    /// RVA of the metadata root
    pub meta_data_rva: u32,
    /// Size of the metadata
    pub meta_data_size: u32,
    /// Flags describing this runtime image
    pub flags: u32,
    /// Token of the MethodDef (or File) entry point, 0 when absent
    pub entry_point_token: u32,
    /// RVA of implementation specific resources
    pub resource_rva: u32,
    /// Size of implementation specific resources
    pub resource_size: u32,
    /// RVA of the strong name hash data
    pub strong_name_signature_rva: u32,
    /// Size of the strong name hash data
    pub strong_name_signature_size: u32,
    /// Always 0
    pub code_manager_table_rva: u32,
    /// Always 0
    pub code_manager_table_size: u32,
    /// RVA of the vtable fixup array
    pub vtable_fixups_rva: u32,
    /// Size of the vtable fixup array
    pub vtable_fixups_size: u32,
    /// Always 0
    pub export_address_table_jmp_rva: u32,
    /// Always 0
    pub export_address_table_jmp_size: u32,
    /// Always 0
    pub managed_native_header_rva: u32,
    /// Always 0
    pub managed_native_header_size: u32,
}

impl Cor20Header {
    /// Size of the serialised header in bytes
    pub const SIZE: usize = 72;

    /// Create a `Cor20Header` object from a sequence of bytes
    ///
    /// # Arguments
    /// * 'data' - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the data is too short or the declared header
    /// size is not 72.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < Self::SIZE {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb != 72 {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;

        let meta_data_rva = parser.read_le::<u32>()?;
        if meta_data_rva == 0 {
            return Err(malformed_error!("Metadata RVA cannot be zero"));
        }

        let meta_data_size = parser.read_le::<u32>()?;
        if meta_data_size == 0 {
            return Err(malformed_error!("Metadata size cannot be zero"));
        }

        Ok(Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            meta_data_rva,
            meta_data_size,
            flags: parser.read_le::<u32>()?,
            entry_point_token: parser.read_le::<u32>()?,
            resource_rva: parser.read_le::<u32>()?,
            resource_size: parser.read_le::<u32>()?,
            strong_name_signature_rva: parser.read_le::<u32>()?,
            strong_name_signature_size: parser.read_le::<u32>()?,
            code_manager_table_rva: parser.read_le::<u32>()?,
            code_manager_table_size: parser.read_le::<u32>()?,
            vtable_fixups_rva: parser.read_le::<u32>()?,
            vtable_fixups_size: parser.read_le::<u32>()?,
            export_address_table_jmp_rva: parser.read_le::<u32>()?,
            export_address_table_jmp_size: parser.read_le::<u32>()?,
            managed_native_header_rva: parser.read_le::<u32>()?,
            managed_native_header_size: parser.read_le::<u32>()?,
        })
    }

    /// Serialise the header into its 72 byte on-disk form
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.cb.to_le_bytes());
        out.extend_from_slice(&self.major_runtime_version.to_le_bytes());
        out.extend_from_slice(&self.minor_runtime_version.to_le_bytes());
        out.extend_from_slice(&self.meta_data_rva.to_le_bytes());
        out.extend_from_slice(&self.meta_data_size.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.entry_point_token.to_le_bytes());
        out.extend_from_slice(&self.resource_rva.to_le_bytes());
        out.extend_from_slice(&self.resource_size.to_le_bytes());
        out.extend_from_slice(&self.strong_name_signature_rva.to_le_bytes());
        out.extend_from_slice(&self.strong_name_signature_size.to_le_bytes());
        out.extend_from_slice(&self.code_manager_table_rva.to_le_bytes());
        out.extend_from_slice(&self.code_manager_table_size.to_le_bytes());
        out.extend_from_slice(&self.vtable_fixups_rva.to_le_bytes());
        out.extend_from_slice(&self.vtable_fixups_size.to_le_bytes());
        out.extend_from_slice(&self.export_address_table_jmp_rva.to_le_bytes());
        out.extend_from_slice(&self.export_address_table_jmp_size.to_le_bytes());
        out.extend_from_slice(&self.managed_native_header_rva.to_le_bytes());
        out.extend_from_slice(&self.managed_native_header_size.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x48, 0x00, 0x00, 0x00, // cb = 72
            0x02, 0x00,             // major_runtime_version = 2
            0x05, 0x00,             // minor_runtime_version = 5
            0x00, 0x20, 0x00, 0x00, // meta_data_rva = 0x2000
            0x00, 0x10, 0x00, 0x00, // meta_data_size = 0x1000
            0x01, 0x00, 0x00, 0x00, // flags = ILONLY
            0x01, 0x00, 0x00, 0x06, // entry_point_token = 0x06000001
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // resources
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // strong name
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // code manager
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // vtable fixups
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // eat jumps
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // managed native hdr
        ];

        let header = Cor20Header::read(&header_bytes).unwrap();

        assert_eq!(header.cb, 72);
        assert_eq!(header.major_runtime_version, 2);
        assert_eq!(header.minor_runtime_version, 5);
        assert_eq!(header.meta_data_rva, 0x2000);
        assert_eq!(header.meta_data_size, 0x1000);
        assert_eq!(header.flags, COMIMAGE_FLAGS_ILONLY);
        assert_eq!(header.entry_point_token, 0x0600_0001);

        // The header must survive a serialisation round trip
        assert_eq!(header.to_bytes(), header_bytes);
    }

    #[test]
    fn rejects_zero_metadata() {
        let mut bytes = [0u8; 72];
        bytes[0] = 0x48; // cb = 72, metadata rva/size left at zero
        assert!(Cor20Header::read(&bytes).is_err());
    }
}
