//! Emission phase of the build pipeline.
//!
//! Runs strictly after contribution: row counts and heap sizes are final, so
//! index widths can be frozen into a [`TableInfo`], the `#~` stream and the
//! four heaps serialised, the metadata root assembled, and everything placed
//! into a minimal single-section PE32 image together with the method bodies
//! and the Cor20 header.
//!
//! The image intentionally carries no import table, relocations or
//! resources — the envelope is just enough PE for the metadata and for
//! PE-structure tools to navigate. Output is deterministic: no timestamps,
//! no randomness, identical input model means identical bytes.

use std::sync::Arc;

use crate::{
    builder::CilAssembly,
    metadata::{
        cor20::{Cor20Header, COMIMAGE_FLAGS_ILONLY},
        root::{Root, StreamHeader, METADATA_MAGIC},
        tables::TableInfo,
    },
    Result,
};

/// RVA of the single `.text` section
const TEXT_RVA: u32 = 0x2000;
/// PE file alignment
const FILE_ALIGN: u32 = 0x200;
/// PE section alignment
const SECTION_ALIGN: u32 = 0x2000;
/// File offset of the `.text` raw data (headers fit below)
const TEXT_FILE_OFFSET: u32 = 0x200;

fn align_to(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) & !(alignment - 1)
}

fn pad_to(buffer: &mut Vec<u8>, alignment: usize) {
    while buffer.len() % alignment != 0 {
        buffer.push(0);
    }
}

/// Lay out and serialise the finished assembly into a PE image.
pub(crate) fn build_image(asm: &mut CilAssembly) -> Result<Vec<u8>> {
    // Method bodies live between the Cor20 header and the metadata root.
    // Fat bodies must start on a 4 byte boundary.
    let bodies_rva = TEXT_RVA + Cor20Header::SIZE as u32;
    let bodies = std::mem::take(&mut asm.bodies);
    let mut bodies_blob: Vec<u8> = Vec::new();
    for (method_rid, bytes) in &bodies {
        let is_fat = bytes.first().is_some_and(|byte| byte & 0x03 == 0x03);
        if is_fat {
            pad_to(&mut bodies_blob, 4);
        }

        #[allow(clippy::cast_possible_truncation)]
        let rva = bodies_rva + bodies_blob.len() as u32;
        let row = asm
            .tables
            .method_def
            .get_mut(*method_rid as usize - 1)
            .ok_or(crate::Error::RowNotFound(crate::Token::from_parts(
                0x06,
                *method_rid,
            )))?;
        row.rva = rva;

        bodies_blob.extend_from_slice(bytes);
    }
    pad_to(&mut bodies_blob, 4);

    // Sizing: heap widths come from the final heap sizes, index widths from
    // the final row counts
    let large_str = asm.strings.is_large();
    let large_blob = asm.blobs.is_large();
    let large_guid = asm.guids.is_large();
    let info = Arc::new(TableInfo::from_counts(
        &asm.tables.counts(),
        large_str,
        large_blob,
        large_guid,
    ));

    let mut tables_stream = asm.tables.emit(&info)?;
    pad_to(&mut tables_stream, 4);

    let strings_heap = std::mem::take(&mut asm.strings).into_bytes();
    let user_strings_heap = std::mem::take(&mut asm.user_strings).into_bytes();
    let guid_heap = std::mem::take(&mut asm.guids).into_bytes();
    let blob_heap = std::mem::take(&mut asm.blobs).into_bytes();

    // Metadata root: stream directory in the conventional order
    let streams: [(&str, &[u8]); 5] = [
        ("#~", &tables_stream),
        ("#Strings", &strings_heap),
        ("#US", &user_strings_heap),
        ("#GUID", &guid_heap),
        ("#Blob", &blob_heap),
    ];

    let mut root = Root {
        signature: METADATA_MAGIC,
        major_version: 1,
        minor_version: 1,
        reserved: 0,
        version: asm.version_string.clone(),
        flags: 0,
        stream_headers: streams
            .iter()
            .map(|(name, data)| StreamHeader {
                offset: 0,
                #[allow(clippy::cast_possible_truncation)]
                size: data.len() as u32,
                name: (*name).to_string(),
            })
            .collect(),
    };

    #[allow(clippy::cast_possible_truncation)]
    let mut stream_offset = root.byte_size() as u32;
    for header in &mut root.stream_headers {
        header.offset = stream_offset;
        stream_offset += header.size;
    }

    let mut metadata = root.write();
    for (_, data) in &streams {
        metadata.extend_from_slice(data);
    }
    debug_assert_eq!(metadata.len(), stream_offset as usize);

    // Cor20 header, bodies, metadata: the .text content
    #[allow(clippy::cast_possible_truncation)]
    let metadata_rva = bodies_rva + bodies_blob.len() as u32;

    let cor20 = Cor20Header {
        cb: 72,
        major_runtime_version: 2,
        minor_runtime_version: 5,
        meta_data_rva: metadata_rva,
        #[allow(clippy::cast_possible_truncation)]
        meta_data_size: metadata.len() as u32,
        flags: COMIMAGE_FLAGS_ILONLY,
        entry_point_token: asm.entry_point.value(),
        resource_rva: 0,
        resource_size: 0,
        strong_name_signature_rva: 0,
        strong_name_signature_size: 0,
        code_manager_table_rva: 0,
        code_manager_table_size: 0,
        vtable_fixups_rva: 0,
        vtable_fixups_size: 0,
        export_address_table_jmp_rva: 0,
        export_address_table_jmp_size: 0,
        managed_native_header_rva: 0,
        managed_native_header_size: 0,
    };

    let mut text = cor20.to_bytes();
    text.extend_from_slice(&bodies_blob);
    text.extend_from_slice(&metadata);

    Ok(write_pe(&text))
}

/// Wrap the `.text` content into a minimal PE32 image.
///
/// One section, no imports, no relocations; data directory 14 points at the
/// Cor20 header at the start of `.text`.
#[allow(clippy::cast_possible_truncation)]
fn write_pe(text: &[u8]) -> Vec<u8> {
    let text_len = text.len() as u32;
    let text_raw_size = align_to(text_len, FILE_ALIGN);
    let image_size = TEXT_RVA + align_to(text_len, SECTION_ALIGN);

    let mut image = Vec::with_capacity((TEXT_FILE_OFFSET + text_raw_size) as usize);

    // DOS header: magic and the pointer to the PE signature
    image.extend_from_slice(b"MZ");
    image.resize(0x3C, 0);
    image.extend_from_slice(&0x80u32.to_le_bytes());
    image.resize(0x80, 0);

    // PE signature + COFF header
    image.extend_from_slice(b"PE\0\0");
    image.extend_from_slice(&0x014Cu16.to_le_bytes()); // machine: i386
    image.extend_from_slice(&1u16.to_le_bytes()); // one section
    image.extend_from_slice(&0u32.to_le_bytes()); // timestamp: fixed for determinism
    image.extend_from_slice(&0u32.to_le_bytes()); // symbol table
    image.extend_from_slice(&0u32.to_le_bytes()); // symbol count
    image.extend_from_slice(&224u16.to_le_bytes()); // optional header size
    image.extend_from_slice(&0x2022u16.to_le_bytes()); // executable | dll | large address aware

    // Optional header, PE32
    image.extend_from_slice(&0x010Bu16.to_le_bytes()); // magic
    image.push(8); // linker major
    image.push(0); // linker minor
    image.extend_from_slice(&text_raw_size.to_le_bytes()); // size of code
    image.extend_from_slice(&0u32.to_le_bytes()); // size of initialised data
    image.extend_from_slice(&0u32.to_le_bytes()); // size of uninitialised data
    image.extend_from_slice(&0u32.to_le_bytes()); // entry point: none, IL only
    image.extend_from_slice(&TEXT_RVA.to_le_bytes()); // base of code
    image.extend_from_slice(&0u32.to_le_bytes()); // base of data
    image.extend_from_slice(&0x0040_0000u32.to_le_bytes()); // image base
    image.extend_from_slice(&SECTION_ALIGN.to_le_bytes());
    image.extend_from_slice(&FILE_ALIGN.to_le_bytes());
    image.extend_from_slice(&4u16.to_le_bytes()); // OS major
    image.extend_from_slice(&0u16.to_le_bytes()); // OS minor
    image.extend_from_slice(&0u16.to_le_bytes()); // image major
    image.extend_from_slice(&0u16.to_le_bytes()); // image minor
    image.extend_from_slice(&4u16.to_le_bytes()); // subsystem major
    image.extend_from_slice(&0u16.to_le_bytes()); // subsystem minor
    image.extend_from_slice(&0u32.to_le_bytes()); // win32 version value
    image.extend_from_slice(&image_size.to_le_bytes());
    image.extend_from_slice(&TEXT_FILE_OFFSET.to_le_bytes()); // size of headers
    image.extend_from_slice(&0u32.to_le_bytes()); // checksum
    image.extend_from_slice(&3u16.to_le_bytes()); // subsystem: console
    image.extend_from_slice(&0x0540u16.to_le_bytes()); // dll characteristics
    image.extend_from_slice(&0x0010_0000u32.to_le_bytes()); // stack reserve
    image.extend_from_slice(&0x1000u32.to_le_bytes()); // stack commit
    image.extend_from_slice(&0x0010_0000u32.to_le_bytes()); // heap reserve
    image.extend_from_slice(&0x1000u32.to_le_bytes()); // heap commit
    image.extend_from_slice(&0u32.to_le_bytes()); // loader flags
    image.extend_from_slice(&16u32.to_le_bytes()); // data directory count

    // 16 data directories; only the CLR runtime header (index 14) is used
    for index in 0..16u32 {
        if index == 14 {
            image.extend_from_slice(&TEXT_RVA.to_le_bytes());
            image.extend_from_slice(&(Cor20Header::SIZE as u32).to_le_bytes());
        } else {
            image.extend_from_slice(&0u64.to_le_bytes());
        }
    }

    // Section table: .text only
    image.extend_from_slice(b".text\0\0\0");
    image.extend_from_slice(&text_len.to_le_bytes()); // virtual size
    image.extend_from_slice(&TEXT_RVA.to_le_bytes()); // virtual address
    image.extend_from_slice(&text_raw_size.to_le_bytes());
    image.extend_from_slice(&TEXT_FILE_OFFSET.to_le_bytes());
    image.extend_from_slice(&0u32.to_le_bytes()); // relocations
    image.extend_from_slice(&0u32.to_le_bytes()); // line numbers
    image.extend_from_slice(&0u16.to_le_bytes()); // relocation count
    image.extend_from_slice(&0u16.to_le_bytes()); // line number count
    image.extend_from_slice(&0x6000_0020u32.to_le_bytes()); // code | execute | read

    // Header padding, section content, file alignment padding
    image.resize(TEXT_FILE_OFFSET as usize, 0);
    image.extend_from_slice(text);
    image.resize((TEXT_FILE_OFFSET + text_raw_size) as usize, 0);

    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_to(0, 0x200), 0);
        assert_eq!(align_to(1, 0x200), 0x200);
        assert_eq!(align_to(0x200, 0x200), 0x200);
        assert_eq!(align_to(0x201, 0x200), 0x400);
    }

    #[test]
    fn pe_shell_is_parseable() {
        let image = write_pe(&[0u8; 128]);
        assert_eq!(&image[..2], b"MZ");
        assert_eq!(image.len() % FILE_ALIGN as usize, 0);

        let pe = goblin::pe::PE::parse(&image).unwrap();
        assert_eq!(pe.sections.len(), 1);
        assert_eq!(pe.sections[0].virtual_address, TEXT_RVA);

        let optional_header = pe.header.optional_header.unwrap();
        let clr = optional_header
            .data_directories
            .get_clr_runtime_header()
            .unwrap();
        assert_eq!(clr.virtual_address, TEXT_RVA);
        assert_eq!(clr.size, 72);
    }
}
