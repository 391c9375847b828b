//! Reconstruct a builder model from a loaded image.
//!
//! [`CilAssembly::from_image`] is the bridge that closes the round-trip:
//! every table row is copied in order with its heap columns re-interned into
//! fresh heaps, method bodies are disassembled and re-assembled through the
//! label machinery, and the `#US` heap is adopted verbatim so that `ldstr`
//! tokens stay valid. Row numbers never change, which is why coded index
//! and simple index columns can be carried over untouched.

use std::collections::BTreeMap;

use crate::{
    assembly::{decode_il, BodyBuilder, Instruction, Label, Operand},
    builder::{heaps::UserStringsBuilder, CilAssembly},
    metadata::{
        image::CilImage,
        method::{ExceptionHandlerFlags, MethodBody},
        streams::{Blob, Guid, Strings},
        token::Token,
    },
    Result,
};

impl CilAssembly {
    /// Rebuild a builder model from a loaded image.
    ///
    /// The rebuilt model emits a canonical image: heaps are freshly
    /// deduplicated, tables re-sorted (a no-op for well-formed input), and
    /// method bodies re-encoded through the assembler. Loading the emitted
    /// image yields a model isomorphic to `image`.
    ///
    /// # Errors
    /// Fails when the image carries references this engine cannot re-encode
    /// (dangling rows, malformed heaps, undecodable bodies)
    pub fn from_image(image: &CilImage) -> Result<CilAssembly> {
        let mut asm = CilAssembly::empty();
        asm.version_string = image.version().to_string();
        asm.entry_point = image.entry_point().unwrap_or(Token::new(0));
        asm.user_strings = UserStringsBuilder::from_existing(
            image.user_strings()?.data(),
        )?;

        let strings = image.strings()?;
        let blobs = image.blobs()?;
        let guids = image.guids()?;

        asm.copy_tables(image, &strings, &blobs, &guids)?;
        asm.rebuild_bodies(image)?;
        asm.close_owner_tracking();

        Ok(asm)
    }

    #[allow(clippy::too_many_lines)]
    fn copy_tables(
        &mut self,
        image: &CilImage,
        strings: &Strings<'_>,
        blobs: &Blob<'_>,
        guids: &Guid<'_>,
    ) -> Result<()> {
        let tables = image.tables();

        // Free helpers rather than closures: each call needs `self` mutably
        // while the heap views stay borrowed
        fn istr(asm: &mut CilAssembly, strings: &Strings<'_>, offset: u32) -> Result<u32> {
            Ok(asm.strings.intern(strings.get(offset as usize)?))
        }
        fn iblob(asm: &mut CilAssembly, blobs: &Blob<'_>, offset: u32) -> Result<u32> {
            asm.blobs.intern(blobs.get(offset as usize)?)
        }
        fn iguid(asm: &mut CilAssembly, guids: &Guid<'_>, ordinal: u32) -> Result<u32> {
            if ordinal == 0 {
                return Ok(0);
            }
            Ok(asm.guids.intern(guids.get(ordinal as usize)?))
        }

        for row in &tables.module {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            copy.mvid = iguid(self, guids, row.mvid)?;
            copy.enc_id = iguid(self, guids, row.enc_id)?;
            copy.enc_base_id = iguid(self, guids, row.enc_base_id)?;
            self.tables.module.push(copy);
        }

        for row in &tables.type_ref {
            let mut copy = row.clone();
            copy.type_name = istr(self, strings, row.type_name)?;
            copy.type_namespace = istr(self, strings, row.type_namespace)?;
            self.tables.type_ref.push(copy);
        }

        for row in &tables.type_def {
            let mut copy = row.clone();
            copy.type_name = istr(self, strings, row.type_name)?;
            copy.type_namespace = istr(self, strings, row.type_namespace)?;
            self.tables.type_def.push(copy);
        }

        self.tables.field_ptr = tables.field_ptr.clone();
        for row in &tables.field {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            copy.signature = iblob(self, blobs, row.signature)?;
            self.tables.field.push(copy);
        }

        self.tables.method_ptr = tables.method_ptr.clone();
        for row in &tables.method_def {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            copy.signature = iblob(self, blobs, row.signature)?;
            // Bodies are re-attached after layout; the stored RVA is stale
            copy.rva = 0;
            self.tables.method_def.push(copy);
        }

        self.tables.param_ptr = tables.param_ptr.clone();
        for row in &tables.param {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            self.tables.param.push(copy);
        }

        self.tables.interface_impl = tables.interface_impl.clone();

        for row in &tables.member_ref {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            copy.signature = iblob(self, blobs, row.signature)?;
            self.tables.member_ref.push(copy);
        }

        for row in &tables.constant {
            let mut copy = row.clone();
            copy.value = iblob(self, blobs, row.value)?;
            self.tables.constant.push(copy);
        }

        for row in &tables.custom_attribute {
            let mut copy = row.clone();
            copy.value = iblob(self, blobs, row.value)?;
            self.tables.custom_attribute.push(copy);
        }

        for row in &tables.field_marshal {
            let mut copy = row.clone();
            copy.native_type = iblob(self, blobs, row.native_type)?;
            self.tables.field_marshal.push(copy);
        }

        for row in &tables.decl_security {
            let mut copy = row.clone();
            copy.permission_set = iblob(self, blobs, row.permission_set)?;
            self.tables.decl_security.push(copy);
        }

        self.tables.class_layout = tables.class_layout.clone();
        self.tables.field_layout = tables.field_layout.clone();

        for row in &tables.stand_alone_sig {
            let mut copy = row.clone();
            copy.signature = iblob(self, blobs, row.signature)?;
            self.tables.stand_alone_sig.push(copy);
        }

        self.tables.event_map = tables.event_map.clone();
        self.tables.event_ptr = tables.event_ptr.clone();
        for row in &tables.event {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            self.tables.event.push(copy);
        }

        self.tables.property_map = tables.property_map.clone();
        self.tables.property_ptr = tables.property_ptr.clone();
        for row in &tables.property {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            copy.signature = iblob(self, blobs, row.signature)?;
            self.tables.property.push(copy);
        }

        self.tables.method_semantics = tables.method_semantics.clone();
        self.tables.method_impl = tables.method_impl.clone();

        for row in &tables.module_ref {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            self.tables.module_ref.push(copy);
        }

        for row in &tables.type_spec {
            let mut copy = row.clone();
            copy.signature = iblob(self, blobs, row.signature)?;
            self.tables.type_spec.push(copy);
        }

        for row in &tables.impl_map {
            let mut copy = row.clone();
            copy.import_name = istr(self, strings, row.import_name)?;
            self.tables.impl_map.push(copy);
        }

        // FieldRVA rows keep their original RVAs: the minimal envelope does
        // not relocate static field data
        self.tables.field_rva = tables.field_rva.clone();
        self.tables.enc_log = tables.enc_log.clone();
        self.tables.enc_map = tables.enc_map.clone();

        for row in &tables.assembly {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            copy.culture = istr(self, strings, row.culture)?;
            copy.public_key = iblob(self, blobs, row.public_key)?;
            self.tables.assembly.push(copy);
        }

        self.tables.assembly_processor = tables.assembly_processor.clone();
        self.tables.assembly_os = tables.assembly_os.clone();

        for row in &tables.assembly_ref {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            copy.culture = istr(self, strings, row.culture)?;
            copy.public_key_or_token = iblob(self, blobs, row.public_key_or_token)?;
            copy.hash_value = iblob(self, blobs, row.hash_value)?;
            self.tables.assembly_ref.push(copy);
        }

        self.tables.assembly_ref_processor = tables.assembly_ref_processor.clone();
        self.tables.assembly_ref_os = tables.assembly_ref_os.clone();

        for row in &tables.file {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            copy.hash_value = iblob(self, blobs, row.hash_value)?;
            self.tables.file.push(copy);
        }

        for row in &tables.exported_type {
            let mut copy = row.clone();
            copy.type_name = istr(self, strings, row.type_name)?;
            copy.type_namespace = istr(self, strings, row.type_namespace)?;
            self.tables.exported_type.push(copy);
        }

        for row in &tables.manifest_resource {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            self.tables.manifest_resource.push(copy);
        }

        self.tables.nested_class = tables.nested_class.clone();

        for row in &tables.generic_param {
            let mut copy = row.clone();
            copy.name = istr(self, strings, row.name)?;
            self.tables.generic_param.push(copy);
        }

        for row in &tables.method_spec {
            let mut copy = row.clone();
            copy.instantiation = iblob(self, blobs, row.instantiation)?;
            self.tables.method_spec.push(copy);
        }

        self.tables.generic_param_constraint = tables.generic_param_constraint.clone();

        Ok(())
    }

    fn rebuild_bodies(&mut self, image: &CilImage) -> Result<()> {
        for row in &image.tables().method_def {
            if row.rva == 0 {
                continue;
            }

            let slice = image.body_slice(row.rva)?;
            let header = MethodBody::parse(slice)?;
            let instructions = decode_il(header.code(slice)?)?;

            let bytes = reassemble_body(&header, &instructions)?;
            self.bodies.push((row.rid, bytes));
        }
        Ok(())
    }

    /// After a rebuild the member ranges of every existing owner are closed;
    /// only owners past the last existing one may still receive members.
    fn close_owner_tracking(&mut self) {
        #[allow(clippy::cast_possible_truncation)]
        let type_count = self.tables.type_def.len() as u32;
        #[allow(clippy::cast_possible_truncation)]
        let method_count = self.tables.method_def.len() as u32;

        if type_count > 0 {
            self.last_field_owner = Some(type_count);
            self.last_method_owner = Some(type_count);
        }
        if method_count > 0 {
            self.last_param_owner = Some(method_count);
        }
        self.last_event_owner = self.tables.event_map.last().map(|row| row.parent);
        self.last_property_owner = self.tables.property_map.last().map(|row| row.parent);
    }
}

/// Re-assemble a decoded body through the label machinery.
///
/// The opcode stream is preserved instruction by instruction (short branch
/// forms stay short), so every branch target's resolved offset survives the
/// round trip. The header format is re-chosen by the assembler's rules.
fn reassemble_body(header: &MethodBody, instructions: &[Instruction]) -> Result<Vec<u8>> {
    let mut builder = BodyBuilder::new();

    if header.is_fat {
        #[allow(clippy::cast_possible_truncation)]
        builder.set_max_stack(header.max_stack as u16);
        if header.local_var_sig_token != 0 {
            builder.set_local_var_sig(Token::new(header.local_var_sig_token));
        }
        builder.set_init_locals(header.is_init_local);
    }

    // Every offset a branch or clause references needs a label
    let mut needed: BTreeMap<u32, Option<Label>> = BTreeMap::new();
    for instruction in instructions {
        match &instruction.operand {
            Operand::Target(target) => {
                needed.insert(*target, None);
            }
            Operand::Switch(targets) => {
                for target in targets {
                    needed.insert(*target, None);
                }
            }
            _ => {}
        }
    }
    for handler in &header.exception_handlers {
        needed.insert(handler.try_offset, None);
        needed.insert(handler.try_offset + handler.try_length, None);
        needed.insert(handler.handler_offset, None);
        needed.insert(handler.handler_offset + handler.handler_length, None);
        if handler.flags.contains(ExceptionHandlerFlags::FILTER) {
            needed.insert(handler.filter_offset, None);
        }
    }
    for slot in needed.values_mut() {
        *slot = Some(builder.label());
    }

    let resolve = |needed: &BTreeMap<u32, Option<Label>>, offset: u32| -> Result<Label> {
        needed
            .get(&offset)
            .and_then(|slot| *slot)
            .ok_or_else(|| malformed_error!("Offset {} has no label", offset))
    };

    // Emit instruction by instruction, binding labels at their offsets
    #[allow(clippy::cast_possible_truncation)]
    let code_size = header.size_code as u32;
    for instruction in instructions {
        if let Some(Some(label)) = needed.get(&instruction.offset) {
            builder.bind(*label)?;
        }

        match &instruction.operand {
            Operand::None => builder.emit(instruction.opcode)?,
            Operand::Int8(value) => builder.emit_i1(instruction.opcode, *value)?,
            Operand::UInt8(value) => builder.emit_var_s(instruction.opcode, *value)?,
            Operand::UInt16(value) => builder.emit_var(instruction.opcode, *value)?,
            Operand::Int32(value) => builder.emit_i4(instruction.opcode, *value)?,
            Operand::Int64(value) => builder.emit_i8(instruction.opcode, *value)?,
            Operand::Float32(value) => builder.emit_r4(instruction.opcode, *value)?,
            Operand::Float64(value) => builder.emit_r8(instruction.opcode, *value)?,
            Operand::Token(token) => builder.emit_token(instruction.opcode, *token)?,
            Operand::Target(target) => {
                builder.emit_branch(instruction.opcode, resolve(&needed, *target)?)?;
            }
            Operand::Switch(targets) => {
                let labels = targets
                    .iter()
                    .map(|target| resolve(&needed, *target))
                    .collect::<Result<Vec<_>>>()?;
                builder.emit_switch(labels)?;
            }
        }
    }

    // Labels at the end of the code bind after the last instruction
    for (&offset, slot) in &needed {
        if offset == code_size {
            if let Some(label) = slot {
                builder.bind(*label)?;
            }
        }
    }

    for handler in &header.exception_handlers {
        let try_start = resolve(&needed, handler.try_offset)?;
        let try_end = resolve(&needed, handler.try_offset + handler.try_length)?;
        let handler_start = resolve(&needed, handler.handler_offset)?;
        let handler_end = resolve(&needed, handler.handler_offset + handler.handler_length)?;

        if handler.flags.contains(ExceptionHandlerFlags::FILTER) {
            let filter = resolve(&needed, handler.filter_offset)?;
            builder.add_filter(try_start, try_end, handler_start, handler_end, filter);
        } else if handler.flags.contains(ExceptionHandlerFlags::FINALLY) {
            builder.add_finally(try_start, try_end, handler_start, handler_end);
        } else if handler.flags.contains(ExceptionHandlerFlags::FAULT) {
            builder.add_fault(try_start, try_end, handler_start, handler_end);
        } else {
            builder.add_catch(
                try_start,
                try_end,
                handler_start,
                handler_end,
                Token::new(handler.class_token),
            );
        }
    }

    builder.serialize()
}
