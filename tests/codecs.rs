//! Codec level properties: compressed integers and coded index widths.

use std::sync::Arc;

use cilforge::metadata::tables::{CodedIndex, CodedIndexType, TableId, TableInfo};
use cilforge::Parser;

/// Encode one value through the crate's writer, decode it through the
/// crate's parser.
fn compressed_round_trip(value: u32) -> u32 {
    let mut buffer = Vec::new();
    cilforge::file::io::write_compressed_uint(value, &mut buffer).unwrap();
    Parser::new(&buffer).read_compressed_uint().unwrap()
}

#[test]
fn compressed_uint_boundary_values() {
    // The literal boundary values of the 1/2/4 byte encodings
    for value in [0u32, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1FFF_FFFE] {
        assert_eq!(compressed_round_trip(value), value, "{value:#x}");
    }
}

#[test]
fn compressed_uint_lengths() {
    for (value, expected_len) in [
        (0u32, 1usize),
        (0x7F, 1),
        (0x80, 2),
        (0x3FFF, 2),
        (0x4000, 4),
        (0x1FFF_FFFE, 4),
    ] {
        let mut buffer = Vec::new();
        cilforge::file::io::write_compressed_uint(value, &mut buffer).unwrap();
        assert_eq!(buffer.len(), expected_len, "{value:#x}");
    }
}

#[test]
fn compressed_uint_sweep() {
    // A spread of values across the whole 29 bit range
    let mut value = 1u32;
    while value < 0x2000_0000 {
        assert_eq!(compressed_round_trip(value - 1), value - 1);
        value = value.saturating_mul(3);
    }
}

const ALL_SPACES: [CodedIndexType; 13] = [
    CodedIndexType::TypeDefOrRef,
    CodedIndexType::HasConstant,
    CodedIndexType::HasCustomAttribute,
    CodedIndexType::HasFieldMarshal,
    CodedIndexType::HasDeclSecurity,
    CodedIndexType::MemberRefParent,
    CodedIndexType::HasSemantics,
    CodedIndexType::MethodDefOrRef,
    CodedIndexType::MemberForwarded,
    CodedIndexType::Implementation,
    CodedIndexType::CustomAttributeType,
    CodedIndexType::ResolutionScope,
    CodedIndexType::TypeOrMethodDef,
];

#[test]
fn coded_index_width_invariance() {
    // For every space: encode a reference into a column of each width and
    // read it back
    for space in ALL_SPACES {
        for &target in space.tables() {
            // Small tables keep every column at 2 bytes
            let info = Arc::new(TableInfo::from_counts(&[(target, 500)], false, false, false));
            let index = CodedIndex::new(target, 321);

            let mut buffer = vec![0u8; 4];
            let mut offset = 0;
            index.write(&mut buffer, &mut offset, &info, space).unwrap();
            assert_eq!(offset as u8, info.coded_index_bytes(space));

            let mut offset = 0;
            let reread = CodedIndex::read(&buffer, &mut offset, &info, space).unwrap();
            assert_eq!(reread.row, 321, "{space:?}/{target:?}");
            assert_eq!(
                CodedIndex::new(reread.tag, reread.row).encode(space).unwrap(),
                index.encode(space).unwrap()
            );

            // A huge target table forces the wide column
            let info = Arc::new(TableInfo::from_counts(
                &[(target, 0x0100_0000)],
                false,
                false,
                false,
            ));
            assert_eq!(info.coded_index_bytes(space), 4);

            let index = CodedIndex::new(target, 0x00F0_0001);
            let mut buffer = vec![0u8; 4];
            let mut offset = 0;
            index.write(&mut buffer, &mut offset, &info, space).unwrap();

            let mut offset = 0;
            let reread = CodedIndex::read(&buffer, &mut offset, &info, space).unwrap();
            assert_eq!(reread.row, 0x00F0_0001);
        }
    }
}

#[test]
fn simple_index_width_threshold() {
    // 0xFFFF rows still fit narrow columns, 0x10000 rows do not
    let narrow = TableInfo::from_counts(&[(TableId::MethodDef, 0xFFFF)], false, false, false);
    assert_eq!(narrow.table_index_bytes(TableId::MethodDef), 2);

    let wide = TableInfo::from_counts(&[(TableId::MethodDef, 0x1_0000)], false, false, false);
    assert_eq!(wide.table_index_bytes(TableId::MethodDef), 4);
}
