//! The full complement of metadata tables in one record.
//!
//! [`TableSet`] holds one row vector per table. The load pipeline fills it by
//! parsing the `#~` (or `#-`) stream; the build pipeline fills it row by row
//! through the builder, then sorts the tables ECMA-335 II.22 requires sorted
//! and serialises everything back in table-id order.
//!
//! Sorting is the one place where row numbers move. Rust's stable sort keeps
//! equal keys in insertion order, which is exactly the deterministic
//! tie-break the emission contract requires. GenericParam is sorted first
//! and a renumbering map is applied to the columns that index it before
//! those tables are themselves sorted.

use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::{
    file::io::{read_le, write_le_at},
    metadata::{
        tables::{
            rows::*, CodedIndex, CodedIndexType, RowReadable, RowWritable, TableId, TableInfo,
            TableInfoRef,
        },
        token::Token,
    },
    Error::OutOfBounds,
    Result,
};

macro_rules! for_each_table {
    ($callback:ident) => {
        $callback! {
            (module, Module, ModuleRaw),
            (type_ref, TypeRef, TypeRefRaw),
            (type_def, TypeDef, TypeDefRaw),
            (field_ptr, FieldPtr, FieldPtrRaw),
            (field, Field, FieldRaw),
            (method_ptr, MethodPtr, MethodPtrRaw),
            (method_def, MethodDef, MethodDefRaw),
            (param_ptr, ParamPtr, ParamPtrRaw),
            (param, Param, ParamRaw),
            (interface_impl, InterfaceImpl, InterfaceImplRaw),
            (member_ref, MemberRef, MemberRefRaw),
            (constant, Constant, ConstantRaw),
            (custom_attribute, CustomAttribute, CustomAttributeRaw),
            (field_marshal, FieldMarshal, FieldMarshalRaw),
            (decl_security, DeclSecurity, DeclSecurityRaw),
            (class_layout, ClassLayout, ClassLayoutRaw),
            (field_layout, FieldLayout, FieldLayoutRaw),
            (stand_alone_sig, StandAloneSig, StandAloneSigRaw),
            (event_map, EventMap, EventMapRaw),
            (event_ptr, EventPtr, EventPtrRaw),
            (event, Event, EventRaw),
            (property_map, PropertyMap, PropertyMapRaw),
            (property_ptr, PropertyPtr, PropertyPtrRaw),
            (property, Property, PropertyRaw),
            (method_semantics, MethodSemantics, MethodSemanticsRaw),
            (method_impl, MethodImpl, MethodImplRaw),
            (module_ref, ModuleRef, ModuleRefRaw),
            (type_spec, TypeSpec, TypeSpecRaw),
            (impl_map, ImplMap, ImplMapRaw),
            (field_rva, FieldRVA, FieldRvaRaw),
            (enc_log, EncLog, EncLogRaw),
            (enc_map, EncMap, EncMapRaw),
            (assembly, Assembly, AssemblyRaw),
            (assembly_processor, AssemblyProcessor, AssemblyProcessorRaw),
            (assembly_os, AssemblyOS, AssemblyOsRaw),
            (assembly_ref, AssemblyRef, AssemblyRefRaw),
            (assembly_ref_processor, AssemblyRefProcessor, AssemblyRefProcessorRaw),
            (assembly_ref_os, AssemblyRefOS, AssemblyRefOsRaw),
            (file, File, FileRaw),
            (exported_type, ExportedType, ExportedTypeRaw),
            (manifest_resource, ManifestResource, ManifestResourceRaw),
            (nested_class, NestedClass, NestedClassRaw),
            (generic_param, GenericParam, GenericParamRaw),
            (method_spec, MethodSpec, MethodSpecRaw),
            (generic_param_constraint, GenericParamConstraint, GenericParamConstraintRaw),
        }
    };
}

macro_rules! define_table_set {
    ($(($field:ident, $id:ident, $row:ty)),* $(,)?) => {
        /// All 45 metadata tables of one image or build, as raw rows.
        #[derive(Default)]
        pub struct TableSet {
            $(
                #[allow(missing_docs)]
                pub $field: Vec<$row>,
            )*
        }

        impl TableSet {
            /// Row count of one table
            #[must_use]
            #[allow(clippy::cast_possible_truncation)]
            pub fn row_count(&self, id: TableId) -> u32 {
                match id {
                    $(TableId::$id => self.$field.len() as u32,)*
                }
            }

            /// `(table, row_count)` pairs of the non-empty tables
            #[must_use]
            pub fn counts(&self) -> Vec<(TableId, u32)> {
                TableId::iter()
                    .map(|id| (id, self.row_count(id)))
                    .filter(|(_, count)| *count > 0)
                    .collect()
            }

            /// The `valid` bit mask advertised in the `#~` header
            #[must_use]
            pub fn valid_mask(&self) -> u64 {
                TableId::iter()
                    .filter(|&id| self.row_count(id) > 0)
                    .fold(0u64, |mask, id| mask | (1u64 << (id as u8)))
            }

            /// Number of non-empty tables
            #[must_use]
            pub fn present_count(&self) -> u32 {
                self.valid_mask().count_ones()
            }

            fn parse_rows(
                &mut self,
                data: &[u8],
                offset: &mut usize,
                info: &TableInfoRef,
            ) -> Result<()> {
                $(
                    {
                        let count = info.get(TableId::$id).rows;
                        self.$field = read_rows::<$row>(data, offset, count, info)?;
                    }
                )*
                Ok(())
            }

            fn emit_rows(
                &self,
                data: &mut [u8],
                offset: &mut usize,
                info: &TableInfoRef,
            ) -> Result<()> {
                $(
                    for row in &self.$field {
                        row.row_write(data, offset, info)?;
                    }
                )*
                Ok(())
            }

            fn rows_byte_size(&self, info: &TableInfoRef) -> usize {
                let mut total = 0usize;
                $(
                    total += <$row as RowReadable>::row_size(info) as usize * self.$field.len();
                )*
                total
            }
        }
    };
}

for_each_table!(define_table_set);

fn read_rows<T: RowReadable>(
    data: &[u8],
    offset: &mut usize,
    count: u32,
    info: &TableInfoRef,
) -> Result<Vec<T>> {
    let mut rows = Vec::with_capacity(count as usize);
    for rid in 1..=count {
        rows.push(T::row_read(data, offset, rid, info)?);
    }
    Ok(rows)
}

/// Header fields of a parsed `#~` stream, alongside the [`TableSet`].
pub struct ParsedTables {
    /// Major version of the table schema, 2
    pub major_version: u8,
    /// Minor version of the table schema, 0
    pub minor_version: u8,
    /// Bit mask of present tables
    pub valid: u64,
    /// Bit mask of tables the producer declares sorted
    pub sorted: u64,
    /// Index sizing derived from the header
    pub info: TableInfoRef,
    /// The materialised rows
    pub tables: TableSet,
}

impl TableSet {
    /// Parse a `#~` (or `#-`) stream into materialised rows.
    ///
    /// ## Arguments
    /// * 'data' - The full table stream
    ///
    /// # Errors
    /// Returns an error for truncated headers, unknown table bits, or rows
    /// that do not parse
    pub fn parse(data: &[u8]) -> Result<ParsedTables> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let valid = read_le::<u64>(&data[8..])?;
        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        let info: TableInfoRef = Arc::new(TableInfo::parse(data, valid)?);

        let mut tables = TableSet::default();
        let mut offset = 24 + valid.count_ones() as usize * 4;
        tables.parse_rows(data, &mut offset, &info)?;

        Ok(ParsedTables {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            info,
            tables,
        })
    }

    /// Serialise the tables into a `#~` stream under the given widths.
    ///
    /// `info` must have been computed from this set's final row counts; the
    /// emitter trusts it and writes the header accordingly.
    ///
    /// # Errors
    /// Returns an error when a column value does not fit its width
    pub fn emit(&self, info: &TableInfoRef) -> Result<Vec<u8>> {
        let valid = self.valid_mask();
        let header_size = 24 + valid.count_ones() as usize * 4;
        let total = header_size + self.rows_byte_size(info);

        let mut data = vec![0u8; total];
        let mut offset = 0;

        let mut heap_sizes = 0u8;
        if info.is_large_str() {
            heap_sizes |= 0x01;
        }
        if info.is_large_guid() {
            heap_sizes |= 0x02;
        }
        if info.is_large_blob() {
            heap_sizes |= 0x04;
        }

        write_le_at::<u32>(&mut data, &mut offset, 0)?; // reserved
        write_le_at::<u8>(&mut data, &mut offset, 2)?; // major version
        write_le_at::<u8>(&mut data, &mut offset, 0)?; // minor version
        write_le_at::<u8>(&mut data, &mut offset, heap_sizes)?;
        write_le_at::<u8>(&mut data, &mut offset, 1)?; // reserved
        write_le_at::<u64>(&mut data, &mut offset, valid)?;
        write_le_at::<u64>(&mut data, &mut offset, TableId::sorted_mask())?;

        for (_, count) in self.counts() {
            write_le_at::<u32>(&mut data, &mut offset, count)?;
        }

        self.emit_rows(&mut data, &mut offset, info)?;
        debug_assert_eq!(offset, total);

        Ok(data)
    }

    /// Sort every table ECMA-335 II.22 requires sorted, renumbering
    /// GenericParam references where sorting moved rows.
    ///
    /// Ties keep insertion order, so two builds of equal models produce
    /// identical output.
    ///
    /// # Errors
    /// Returns an error when a stored coded index cannot be encoded, which
    /// indicates a row was constructed with an illegal target table
    pub fn sort_required(&mut self) -> Result<()> {
        // Tables that sorting renumbers AND that are legal HasCustomAttribute
        // targets come first: each one's old-to-new map must be applied to
        // CustomAttribute parents (and any other referencing column) before
        // CustomAttribute itself sorts on those parent values.
        let gp_remap = sort_by_encoded(
            &mut self.generic_param,
            |row| {
                Ok(
                    (u64::from(row.owner.encode(CodedIndexType::TypeOrMethodDef)?) << 16)
                        | u64::from(row.number),
                )
            },
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x2A, rid);
            },
        )?;
        if let Some(remap) = gp_remap {
            for row in &mut self.generic_param_constraint {
                let old = row.owner as usize;
                if old == 0 || old >= remap.len() {
                    return Err(crate::Error::RowNotFound(Token::from_parts(
                        0x2A, row.owner,
                    )));
                }
                row.owner = remap[old];
            }
            self.remap_attribute_parents(TableId::GenericParam, &remap)?;
        }

        let ii_remap = sort_by_encoded(
            &mut self.interface_impl,
            |row| {
                Ok((u64::from(row.class) << 32)
                    | u64::from(row.interface.encode(CodedIndexType::TypeDefOrRef)?))
            },
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x09, rid);
            },
        )?;
        if let Some(remap) = ii_remap {
            self.remap_attribute_parents(TableId::InterfaceImpl, &remap)?;
        }

        let ds_remap = sort_by_encoded(
            &mut self.decl_security,
            |row| Ok(u64::from(row.parent.encode(CodedIndexType::HasDeclSecurity)?)),
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x0E, rid);
            },
        )?;
        if let Some(remap) = ds_remap {
            self.remap_attribute_parents(TableId::DeclSecurity, &remap)?;
        }

        // Constraint owners are final after the GenericParam remap above
        let gpc_remap = sort_by_encoded(
            &mut self.generic_param_constraint,
            |row| Ok(u64::from(row.owner)),
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x2C, rid);
            },
        )?;
        if let Some(remap) = gpc_remap {
            self.remap_attribute_parents(TableId::GenericParamConstraint, &remap)?;
        }

        // CustomAttribute sorts on parent values that no longer move
        sort_by_encoded(
            &mut self.custom_attribute,
            |row| {
                Ok(u64::from(
                    row.parent.encode(CodedIndexType::HasCustomAttribute)?,
                ))
            },
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x0C, rid);
            },
        )?;

        // The remaining sorted tables are referenced by nothing that moves
        sort_by_encoded(
            &mut self.constant,
            |row| Ok(u64::from(row.parent.encode(CodedIndexType::HasConstant)?)),
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x0B, rid);
            },
        )?;
        sort_by_encoded(
            &mut self.field_marshal,
            |row| Ok(u64::from(row.parent.encode(CodedIndexType::HasFieldMarshal)?)),
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x0D, rid);
            },
        )?;
        sort_by_encoded(
            &mut self.class_layout,
            |row| Ok(u64::from(row.parent)),
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x0F, rid);
            },
        )?;
        sort_by_encoded(
            &mut self.field_layout,
            |row| Ok(u64::from(row.field)),
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x10, rid);
            },
        )?;
        sort_by_encoded(
            &mut self.method_semantics,
            |row| {
                Ok(u64::from(
                    row.association.encode(CodedIndexType::HasSemantics)?,
                ))
            },
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x18, rid);
            },
        )?;
        sort_by_encoded(
            &mut self.method_impl,
            |row| Ok(u64::from(row.class)),
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x19, rid);
            },
        )?;
        sort_by_encoded(
            &mut self.impl_map,
            |row| {
                Ok(u64::from(
                    row.member_forwarded.encode(CodedIndexType::MemberForwarded)?,
                ))
            },
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x1C, rid);
            },
        )?;
        sort_by_encoded(
            &mut self.field_rva,
            |row| Ok(u64::from(row.field)),
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x1D, rid);
            },
        )?;
        sort_by_encoded(
            &mut self.nested_class,
            |row| Ok(u64::from(row.nested_class)),
            |row, rid| {
                row.rid = rid;
                row.token = Token::from_parts(0x29, rid);
            },
        )?;

        Ok(())
    }

    /// Rewrite CustomAttribute parents targeting `table` through an
    /// old-rid to new-rid map produced by a sort.
    fn remap_attribute_parents(&mut self, table: TableId, remap: &[u32]) -> Result<()> {
        for row in &mut self.custom_attribute {
            if row.parent.tag == table {
                let old = row.parent.row as usize;
                if old == 0 || old >= remap.len() {
                    return Err(crate::Error::RowNotFound(row.parent.token));
                }
                row.parent = CodedIndex::new(table, remap[old]);
            }
        }
        Ok(())
    }
}

fn sorted_permutation(keys: &[u64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by_key(|&index| (keys[index], index));
    order
}

fn is_identity(perm: &[usize]) -> bool {
    perm.iter().enumerate().all(|(index, &value)| index == value)
}

fn apply_permutation<T: Clone>(rows: &mut Vec<T>, perm: &[usize]) {
    let reordered: Vec<T> = perm.iter().map(|&index| rows[index].clone()).collect();
    *rows = reordered;
}

fn renumber<T>(rows: &mut [T], mut set_rid: impl FnMut(&mut T, u32)) {
    for (index, row) in rows.iter_mut().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        set_rid(row, index as u32 + 1);
    }
}

/// Stable-sort one table by its encoded key and reassign row numbers.
///
/// Returns `None` when nothing moved, or the old-rid to new-rid map
/// (1-based, slot 0 unused) the caller must push through every column that
/// indexes the sorted table.
#[allow(clippy::cast_possible_truncation)]
fn sort_by_encoded<T: Clone>(
    rows: &mut Vec<T>,
    key: impl Fn(&T) -> Result<u64>,
    set_rid: impl FnMut(&mut T, u32),
) -> Result<Option<Vec<u32>>> {
    let keys: Vec<u64> = rows.iter().map(&key).collect::<Result<_>>()?;
    let perm = sorted_permutation(&keys);
    if is_identity(&perm) {
        return Ok(None);
    }

    apply_permutation(rows, &perm);
    renumber(rows, set_rid);

    let mut remap = vec![0u32; perm.len() + 1];
    for (new_index, &old_index) in perm.iter().enumerate() {
        remap[old_index + 1] = new_index as u32 + 1;
    }
    Ok(Some(remap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::CodedIndex;

    fn empty_info(set: &TableSet) -> TableInfoRef {
        Arc::new(TableInfo::from_counts(&set.counts(), false, false, false))
    }

    #[test]
    fn emit_parse_round_trip() {
        let mut set = TableSet::default();
        set.module.push(ModuleRaw {
            rid: 1,
            token: Token::from_parts(0x00, 1),
            offset: 0,
            generation: 0,
            name: 1,
            mvid: 1,
            enc_id: 0,
            enc_base_id: 0,
        });
        set.type_def.push(TypeDefRaw {
            rid: 1,
            token: Token::from_parts(0x02, 1),
            offset: 0,
            flags: 0,
            type_name: 10,
            type_namespace: 0,
            extends: CodedIndex::new(TableId::TypeDef, 0),
            field_list: 1,
            method_list: 1,
        });

        let info = empty_info(&set);
        let bytes = set.emit(&info).unwrap();

        let parsed = TableSet::parse(&bytes).unwrap();
        assert_eq!(parsed.major_version, 2);
        assert_eq!(parsed.minor_version, 0);
        assert_eq!(parsed.valid, set.valid_mask());
        assert_eq!(parsed.tables.module.len(), 1);
        assert_eq!(parsed.tables.type_def.len(), 1);
        assert_eq!(parsed.tables.module[0].name, 1);
        assert_eq!(parsed.tables.type_def[0].type_name, 10);
    }

    #[test]
    fn sort_nested_class() {
        let mut set = TableSet::default();
        for (rid, (nested, enclosing)) in [(3u32, 1u32), (2, 1)].iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            set.nested_class.push(NestedClassRaw {
                rid: rid as u32 + 1,
                token: Token::from_parts(0x29, rid as u32 + 1),
                offset: 0,
                nested_class: *nested,
                enclosing_class: *enclosing,
            });
        }

        set.sort_required().unwrap();
        assert_eq!(set.nested_class[0].nested_class, 2);
        assert_eq!(set.nested_class[1].nested_class, 3);
    }

    #[test]
    fn sort_generic_param_remaps_constraints() {
        let mut set = TableSet::default();
        // Two params in reverse owner order: row 1 owned by TypeDef 2,
        // row 2 owned by TypeDef 1
        set.generic_param.push(GenericParamRaw {
            rid: 1,
            token: Token::from_parts(0x2A, 1),
            offset: 0,
            number: 0,
            flags: 0,
            owner: CodedIndex::new(TableId::TypeDef, 2),
            name: 5,
        });
        set.generic_param.push(GenericParamRaw {
            rid: 2,
            token: Token::from_parts(0x2A, 2),
            offset: 0,
            number: 0,
            flags: 0,
            owner: CodedIndex::new(TableId::TypeDef, 1),
            name: 9,
        });
        // A constraint on the old row 1
        set.generic_param_constraint.push(GenericParamConstraintRaw {
            rid: 1,
            token: Token::from_parts(0x2C, 1),
            offset: 0,
            owner: 1,
            constraint: CodedIndex::new(TableId::TypeRef, 1),
        });

        set.sort_required().unwrap();

        // The param owned by TypeDef 1 now comes first
        assert_eq!(set.generic_param[0].owner.row, 1);
        assert_eq!(set.generic_param[0].name, 9);
        // The constraint followed its param from row 1 to row 2
        assert_eq!(set.generic_param_constraint[0].owner, 2);
    }

    #[test]
    fn sort_remaps_attribute_parents() {
        let mut set = TableSet::default();

        // Two implementations in reverse class order; sorting swaps them
        for (rid, class) in [(1u32, 2u32), (2, 1)] {
            set.interface_impl.push(InterfaceImplRaw {
                rid,
                token: Token::from_parts(0x09, rid),
                offset: 0,
                class,
                interface: CodedIndex::new(TableId::TypeRef, 1),
            });
        }
        // Two security rows in reverse parent order
        for (rid, parent) in [(1u32, 2u32), (2, 1)] {
            set.decl_security.push(DeclSecurityRaw {
                rid,
                token: Token::from_parts(0x0E, rid),
                offset: 0,
                action: 8,
                parent: CodedIndex::new(TableId::TypeDef, parent),
                permission_set: 0,
            });
        }
        // Two constraints in reverse owner order
        for (rid, owner) in [(1u32, 2u32), (2, 1)] {
            set.generic_param_constraint.push(GenericParamConstraintRaw {
                rid,
                token: Token::from_parts(0x2C, rid),
                offset: 0,
                owner,
                constraint: CodedIndex::new(TableId::TypeRef, 1),
            });
        }
        // One attribute on the first row of each table; every one of those
        // rows ends up as row 2 after sorting
        for (tag, value) in [
            (TableId::InterfaceImpl, 10u32),
            (TableId::DeclSecurity, 20),
            (TableId::GenericParamConstraint, 30),
        ] {
            let rid = set.custom_attribute.len() as u32 + 1;
            set.custom_attribute.push(CustomAttributeRaw {
                rid,
                token: Token::from_parts(0x0C, rid),
                offset: 0,
                parent: CodedIndex::new(tag, 1),
                constructor: CodedIndex::new(TableId::MemberRef, 1),
                value,
            });
        }

        set.sort_required().unwrap();

        assert_eq!(set.interface_impl[0].class, 1);
        assert_eq!(set.decl_security[0].parent.row, 1);
        assert_eq!(set.generic_param_constraint[0].owner, 1);

        // Each attribute followed its parent row to its new number
        for (tag, value) in [
            (TableId::InterfaceImpl, 10u32),
            (TableId::DeclSecurity, 20),
            (TableId::GenericParamConstraint, 30),
        ] {
            let attribute = set
                .custom_attribute
                .iter()
                .find(|row| row.value == value)
                .unwrap();
            assert_eq!(attribute.parent.tag, tag);
            assert_eq!(attribute.parent.row, 2);
        }
    }

    #[test]
    fn sort_ties_keep_insertion_order() {
        let mut set = TableSet::default();
        for value in [7u32, 3, 9] {
            set.custom_attribute.push(CustomAttributeRaw {
                rid: 1,
                token: Token::from_parts(0x0C, 1),
                offset: 0,
                parent: CodedIndex::new(TableId::TypeDef, 1), // all equal keys
                constructor: CodedIndex::new(TableId::MemberRef, 1),
                value,
            });
        }

        set.sort_required().unwrap();
        let values: Vec<u32> = set.custom_attribute.iter().map(|row| row.value).collect();
        assert_eq!(values, vec![7, 3, 9]);
    }
}
