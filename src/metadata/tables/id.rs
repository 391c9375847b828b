//! Table identifiers for the 45 CLI metadata tables.

use strum::{EnumCount, EnumIter};

/// Identifier of one CLI metadata table (ECMA-335 II.22).
///
/// The discriminant is the on-disk table id: the bit position inside the
/// `#~` header's `valid`/`sorted` masks and the high byte of metadata tokens
/// referencing the table.
#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Copy, EnumIter, EnumCount)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRVA = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOS = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOS = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// The highest table id this engine knows
    pub const LAST: TableId = TableId::GenericParamConstraint;

    /// Build a `TableId` from its on-disk numeric id
    #[must_use]
    pub fn from_u8(value: u8) -> Option<TableId> {
        use strum::IntoEnumIterator;
        TableId::iter().find(|&id| id as u8 == value)
    }

    /// Tables ECMA-335 II.22 requires to be sorted, in the order this engine
    /// sorts them. The renumbered HasCustomAttribute targets (GenericParam,
    /// InterfaceImpl, DeclSecurity, GenericParamConstraint) come first so
    /// that their old-to-new row maps reach every referencing column before
    /// CustomAttribute itself is sorted on those parent values.
    #[must_use]
    pub fn sorted_tables() -> &'static [TableId] {
        &[
            TableId::GenericParam,
            TableId::InterfaceImpl,
            TableId::DeclSecurity,
            TableId::GenericParamConstraint,
            TableId::CustomAttribute,
            TableId::Constant,
            TableId::FieldMarshal,
            TableId::ClassLayout,
            TableId::FieldLayout,
            TableId::MethodSemantics,
            TableId::MethodImpl,
            TableId::ImplMap,
            TableId::FieldRVA,
            TableId::NestedClass,
        ]
    }

    /// The `sorted` bit mask advertised in the `#~` header
    #[must_use]
    pub fn sorted_mask() -> u64 {
        Self::sorted_tables()
            .iter()
            .fold(0u64, |mask, &id| mask | (1u64 << (id as u8)))
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn ids_are_contiguous() {
        // 45 tables, ids 0x00..=0x2C without gaps
        let ids: Vec<u8> = TableId::iter().map(|id| id as u8).collect();
        assert_eq!(ids.len(), 45);
        assert_eq!(ids.first(), Some(&0x00));
        assert_eq!(ids.last(), Some(&0x2C));
        for window in ids.windows(2) {
            assert_eq!(window[1], window[0] + 1);
        }
    }

    #[test]
    fn from_u8() {
        assert_eq!(TableId::from_u8(0x02), Some(TableId::TypeDef));
        assert_eq!(TableId::from_u8(0x2C), Some(TableId::GenericParamConstraint));
        assert_eq!(TableId::from_u8(0x2D), None);
    }

    #[test]
    fn sorted_mask_bits() {
        let mask = TableId::sorted_mask();
        assert!(mask & (1 << 0x29) != 0); // NestedClass
        assert!(mask & (1 << 0x0A) == 0); // MemberRef keeps insertion order
        assert!(mask & (1 << 0x06) == 0); // MethodDef is never re-sorted
    }
}
