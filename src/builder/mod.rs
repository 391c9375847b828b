//! The write pipeline: build an assembly in memory, emit a PE/CLI image.
//!
//! [`CilAssembly`] is the programmatic model root. Every `add`-style call is
//! a *contribution*: it appends rows to the [`crate::metadata::tables::TableSet`],
//! interns names and signatures into the heap builders, and hands back the
//! final metadata token of the new row. Row numbers never change after a
//! contribution — the only exception is the ECMA-mandated table sort during
//! [`CilAssembly::finish`], which renumbers the sorted tables other columns
//! can reference (GenericParam, InterfaceImpl, DeclSecurity,
//! GenericParamConstraint) and repairs every column that references them.
//!
//! Three phases, strictly ordered:
//! 1. contribution (this module) — rows appended, heaps interned;
//! 2. sizing — after the last contribution, `finish` freezes row counts and
//!    heap sizes into index widths;
//! 3. emission ([`emit`]) — tables sorted, streams serialised, image laid
//!    out. A contribution after `finish` is a contract violation.
//!
//! # Example
//!
//! ```rust
//! use cilforge::builder::CilAssembly;
//!
//! let mut asm = CilAssembly::new("Empty", (1, 0, 0, 0), "Empty.dll");
//! let image = asm.finish()?;
//! assert_eq!(&image[..2], b"MZ");
//! # Ok::<(), cilforge::Error>(())
//! ```

pub(crate) mod emit;
mod heaps;
mod rebuild;

pub use heaps::{BlobBuilder, GuidBuilder, StringsBuilder, UserStringsBuilder};

use rustc_hash::FxHashMap;

use crate::{
    assembly::BodyBuilder,
    metadata::{
        signatures::{
            encode_field_sig, encode_local_var_sig, encode_method_sig, encode_method_spec_sig,
            encode_property_sig, encode_type_spec_sig, FieldSig, LocalVarSig, MethodSig,
            MethodSpecSig, PropertySig, TypeSpecSig,
        },
        tables::{rows::*, CodedIndex, CodedIndexType, TableId, TableSet},
        token::Token,
    },
    Error::ContractViolation,
    Result,
};

/// Default metadata version string, the CLR 4 runtime family
const DEFAULT_VERSION_STRING: &str = "v4.0.30319";

/// SHA1, the hash algorithm every mainstream compiler records
const HASH_ALG_SHA1: u32 = 0x8004;

/// TypeAttributes bits of the `<Module>` pseudo type
const MODULE_TYPE_FLAGS: u32 = 0;

/// An assembly under construction.
///
/// Created either empty via [`CilAssembly::new`] (which seeds the Module,
/// Assembly and `<Module>` rows every image carries) or from a loaded image
/// via [`CilAssembly::from_image`]. Dropped without [`CilAssembly::finish`],
/// nothing is emitted.
pub struct CilAssembly {
    pub(crate) tables: TableSet,
    pub(crate) strings: StringsBuilder,
    pub(crate) user_strings: UserStringsBuilder,
    pub(crate) blobs: BlobBuilder,
    pub(crate) guids: GuidBuilder,

    /// Serialised method bodies awaiting RVA assignment, keyed by MethodDef rid
    pub(crate) bodies: Vec<(u32, Vec<u8>)>,
    pub(crate) entry_point: Token,
    pub(crate) version_string: String,
    finished: bool,

    // Contiguity bookkeeping: the one row range still open per member kind
    last_field_owner: Option<u32>,
    last_method_owner: Option<u32>,
    last_param_owner: Option<u32>,
    last_event_owner: Option<u32>,
    last_property_owner: Option<u32>,

    // Content-addressed row maps for deduplication
    type_refs: FxHashMap<(u32, u32, u32), Token>,
    type_specs: FxHashMap<u32, Token>,
    member_refs: FxHashMap<(u32, u32, u32), Token>,
    method_specs: FxHashMap<(u32, u32), Token>,
    stand_alone_sigs: FxHashMap<u32, Token>,
    assembly_refs: FxHashMap<u32, Token>,
    module_refs: FxHashMap<u32, Token>,
    fields: FxHashMap<(u32, u32, u32), Token>,
    methods: FxHashMap<(u32, u32, u32), Token>,
}

impl CilAssembly {
    /// Create a new assembly with its module.
    ///
    /// Seeds the three rows every single-module assembly carries: the
    /// Assembly manifest row, the Module row (nil MVID until
    /// [`CilAssembly::set_mvid`]), and the `<Module>` pseudo type as TypeDef
    /// row 1.
    ///
    /// ## Arguments
    /// * 'name' - Assembly simple name
    /// * 'version' - `(major, minor, build, revision)`
    /// * 'module_name' - Module file name, e.g. `Name.dll`
    #[must_use]
    pub fn new(name: &str, version: (u16, u16, u16, u16), module_name: &str) -> Self {
        let mut asm = Self::empty();

        let module_name_off = asm.strings.intern(module_name);
        let mvid = asm.guids.intern(uguid::Guid::ZERO);
        asm.tables.module.push(ModuleRaw {
            rid: 1,
            token: Token::from_parts(0x00, 1),
            offset: 0,
            generation: 0,
            name: module_name_off,
            mvid,
            enc_id: 0,
            enc_base_id: 0,
        });

        let assembly_name_off = asm.strings.intern(name);
        asm.tables.assembly.push(AssemblyRaw {
            rid: 1,
            token: Token::from_parts(0x20, 1),
            offset: 0,
            hash_alg_id: HASH_ALG_SHA1,
            major_version: version.0,
            minor_version: version.1,
            build_number: version.2,
            revision_number: version.3,
            flags: 0,
            public_key: 0,
            name: assembly_name_off,
            culture: 0,
        });

        let module_type_off = asm.strings.intern("<Module>");
        asm.tables.type_def.push(TypeDefRaw {
            rid: 1,
            token: Token::from_parts(0x02, 1),
            offset: 0,
            flags: MODULE_TYPE_FLAGS,
            type_name: module_type_off,
            type_namespace: 0,
            extends: CodedIndex::new(TableId::TypeDef, 0),
            field_list: 0,
            method_list: 0,
        });

        asm
    }

    /// A builder with nothing seeded, for the load-path reconstruction
    pub(crate) fn empty() -> Self {
        CilAssembly {
            tables: TableSet::default(),
            strings: StringsBuilder::new(),
            user_strings: UserStringsBuilder::new(),
            blobs: BlobBuilder::new(),
            guids: GuidBuilder::new(),
            bodies: Vec::new(),
            entry_point: Token::new(0),
            version_string: DEFAULT_VERSION_STRING.to_string(),
            finished: false,
            last_field_owner: None,
            last_method_owner: None,
            last_param_owner: None,
            last_event_owner: None,
            last_property_owner: None,
            type_refs: FxHashMap::default(),
            type_specs: FxHashMap::default(),
            member_refs: FxHashMap::default(),
            method_specs: FxHashMap::default(),
            stand_alone_sigs: FxHashMap::default(),
            assembly_refs: FxHashMap::default(),
            module_refs: FxHashMap::default(),
            fields: FxHashMap::default(),
            methods: FxHashMap::default(),
        }
    }

    /// Set the module version identifier
    pub fn set_mvid(&mut self, mvid: uguid::Guid) {
        let ordinal = self.guids.intern(mvid);
        if let Some(module) = self.tables.module.first_mut() {
            module.mvid = ordinal;
        }
    }

    /// Override the metadata version string (default `v4.0.30319`)
    pub fn set_version_string(&mut self, version: &str) {
        self.version_string = version.to_string();
    }

    /// Mark a MethodDef as the image entry point
    pub fn set_entry_point(&mut self, method: Token) {
        self.entry_point = method;
    }

    fn check_building(&self) -> Result<()> {
        if self.finished {
            return Err(ContractViolation("contribution after finish"));
        }
        Ok(())
    }

    fn expect_row(&self, token: Token, table: TableId) -> Result<u32> {
        if token.table() != table as u8
            || token.is_null()
            || token.row() > self.tables.row_count(table)
        {
            return Err(crate::Error::RowNotFound(token));
        }
        Ok(token.row())
    }

    fn coded(&self, token: Token, space: CodedIndexType) -> Result<CodedIndex> {
        let index = CodedIndex::from_token(token)?;
        if space.tag_of(index.tag).is_none() {
            return Err(malformed_error!(
                "Token {} is not a legal {:?} target",
                token,
                space
            ));
        }
        if index.row > self.tables.row_count(index.tag) {
            return Err(crate::Error::RowNotFound(token));
        }
        Ok(index)
    }

    /// Add an AssemblyRef row, deduplicated by name.
    ///
    /// ## Arguments
    /// * 'name' - Simple name of the referenced assembly, e.g. `mscorlib`
    /// * 'version' - `(major, minor, build, revision)`
    /// * 'public_key_token' - 8 byte key token, empty for unsigned refs
    ///
    /// # Errors
    /// Returns an error after `finish`
    pub fn assembly_ref(
        &mut self,
        name: &str,
        version: (u16, u16, u16, u16),
        public_key_token: &[u8],
    ) -> Result<Token> {
        self.check_building()?;

        let name_off = self.strings.intern(name);
        if let Some(&existing) = self.assembly_refs.get(&name_off) {
            return Ok(existing);
        }

        let key_off = self.blobs.intern(public_key_token)?;
        let rid = self.tables.assembly_ref.len() as u32 + 1;
        let token = Token::from_parts(0x23, rid);
        self.tables.assembly_ref.push(AssemblyRefRaw {
            rid,
            token,
            offset: 0,
            major_version: version.0,
            minor_version: version.1,
            build_number: version.2,
            revision_number: version.3,
            flags: 0,
            public_key_or_token: key_off,
            name: name_off,
            culture: 0,
            hash_value: 0,
        });
        self.assembly_refs.insert(name_off, token);
        Ok(token)
    }

    /// Add a ModuleRef row, deduplicated by name.
    ///
    /// # Errors
    /// Returns an error after `finish`
    pub fn module_ref(&mut self, name: &str) -> Result<Token> {
        self.check_building()?;

        let name_off = self.strings.intern(name);
        if let Some(&existing) = self.module_refs.get(&name_off) {
            return Ok(existing);
        }

        let rid = self.tables.module_ref.len() as u32 + 1;
        let token = Token::from_parts(0x1A, rid);
        self.tables.module_ref.push(ModuleRefRaw {
            rid,
            token,
            offset: 0,
            name: name_off,
        });
        self.module_refs.insert(name_off, token);
        Ok(token)
    }

    /// Add a TypeRef row, deduplicated by `(scope, namespace, name)`.
    ///
    /// ## Arguments
    /// * 'scope' - ResolutionScope token: AssemblyRef, ModuleRef, Module or
    ///   an enclosing TypeRef for nested references
    /// * 'namespace' - Namespace, empty for none
    /// * 'name' - Type name
    ///
    /// # Errors
    /// Returns an error for scopes that are not legal resolution scopes
    pub fn type_ref(&mut self, scope: Token, namespace: &str, name: &str) -> Result<Token> {
        self.check_building()?;

        let scope_index = self.coded(scope, CodedIndexType::ResolutionScope)?;
        let name_off = self.strings.intern(name);
        let namespace_off = self.strings.intern(namespace);

        let key = (scope.value(), namespace_off, name_off);
        if let Some(&existing) = self.type_refs.get(&key) {
            return Ok(existing);
        }

        let rid = self.tables.type_ref.len() as u32 + 1;
        let token = Token::from_parts(0x01, rid);
        self.tables.type_ref.push(TypeRefRaw {
            rid,
            token,
            offset: 0,
            resolution_scope: scope_index,
            type_name: name_off,
            type_namespace: namespace_off,
        });
        self.type_refs.insert(key, token);
        Ok(token)
    }

    /// Add a TypeDef row.
    ///
    /// ## Arguments
    /// * 'namespace' - Namespace, empty for none
    /// * 'name' - Type name
    /// * 'flags' - TypeAttributes
    /// * 'extends' - TypeDefOrRef token of the base type; `Token::new(0)`
    ///   for interfaces and `<Module>`-style types
    ///
    /// # Errors
    /// Returns an error when `extends` is neither null nor a legal
    /// TypeDefOrRef target
    pub fn class(
        &mut self,
        namespace: &str,
        name: &str,
        flags: u32,
        extends: Token,
    ) -> Result<Token> {
        self.check_building()?;

        let extends_index = if extends.value() == 0 {
            CodedIndex::new(TableId::TypeDef, 0)
        } else {
            self.coded(extends, CodedIndexType::TypeDefOrRef)?
        };

        let name_off = self.strings.intern(name);
        let namespace_off = self.strings.intern(namespace);

        let rid = self.tables.type_def.len() as u32 + 1;
        let token = Token::from_parts(0x02, rid);
        self.tables.type_def.push(TypeDefRaw {
            rid,
            token,
            offset: 0,
            flags,
            type_name: name_off,
            type_namespace: namespace_off,
            extends: extends_index,
            field_list: 0,
            method_list: 0,
        });
        Ok(token)
    }

    /// Record `nested` as a type nested inside `enclosing`.
    ///
    /// # Errors
    /// Returns an error when either token is not an existing TypeDef row
    pub fn nested_class(&mut self, nested: Token, enclosing: Token) -> Result<()> {
        self.check_building()?;
        let nested_rid = self.expect_row(nested, TableId::TypeDef)?;
        let enclosing_rid = self.expect_row(enclosing, TableId::TypeDef)?;

        let rid = self.tables.nested_class.len() as u32 + 1;
        self.tables.nested_class.push(NestedClassRaw {
            rid,
            token: Token::from_parts(0x29, rid),
            offset: 0,
            nested_class: nested_rid,
            enclosing_class: enclosing_rid,
        });
        Ok(())
    }

    /// Record that `class` implements `interface`.
    ///
    /// The returned token addresses the new row, e.g. as a
    /// [`CilAssembly::custom_attribute`] parent. The mandated table sort
    /// during `finish` may renumber the row; attributes attached to it are
    /// carried along.
    ///
    /// # Errors
    /// Returns an error when `class` is not a TypeDef row or `interface` is
    /// not a TypeDefOrRef target
    pub fn interface_impl(&mut self, class: Token, interface: Token) -> Result<Token> {
        self.check_building()?;
        let class_rid = self.expect_row(class, TableId::TypeDef)?;
        let interface_index = self.coded(interface, CodedIndexType::TypeDefOrRef)?;

        let rid = self.tables.interface_impl.len() as u32 + 1;
        let token = Token::from_parts(0x09, rid);
        self.tables.interface_impl.push(InterfaceImplRaw {
            rid,
            token,
            offset: 0,
            class: class_rid,
            interface: interface_index,
        });
        Ok(token)
    }

    /// Add a Field row owned by `class`.
    ///
    /// Fields of one class must be added contiguously, and classes must
    /// receive their fields in TypeDef row order — that is what keeps the
    /// `field_list` ranges valid. Adding a field with the name and signature
    /// of an existing field of the same class is not a new row: the existing
    /// field's token is returned unchanged.
    ///
    /// # Errors
    /// Returns an error when the contiguity rules are violated
    pub fn field(
        &mut self,
        class: Token,
        name: &str,
        signature: &FieldSig,
        flags: u16,
    ) -> Result<Token> {
        self.check_building()?;
        let class_rid = self.expect_row(class, TableId::TypeDef)?;

        let name_off = self.strings.intern(name);
        let sig_off = self.blobs.intern(&encode_field_sig(signature)?)?;

        let key = (class_rid, name_off, sig_off);
        if let Some(&existing) = self.fields.get(&key) {
            return Ok(existing);
        }

        let rid = self.tables.field.len() as u32 + 1;
        self.open_member_range(
            class_rid,
            rid,
            MemberKind::Field,
        )?;

        let token = Token::from_parts(0x04, rid);
        self.tables.field.push(FieldRaw {
            rid,
            token,
            offset: 0,
            flags,
            name: name_off,
            signature: sig_off,
        });
        self.fields.insert(key, token);
        Ok(token)
    }

    /// Add a MethodDef row owned by `class`.
    ///
    /// The same contiguity rules as [`CilAssembly::field`] apply; a method
    /// with the name and signature of an existing method of the same class
    /// returns the existing token unchanged. The body is attached separately
    /// via [`CilAssembly::method_body`].
    ///
    /// # Errors
    /// Returns an error when the contiguity rules are violated
    pub fn method(
        &mut self,
        class: Token,
        name: &str,
        signature: &MethodSig,
        flags: u16,
        impl_flags: u16,
    ) -> Result<Token> {
        self.check_building()?;
        let class_rid = self.expect_row(class, TableId::TypeDef)?;

        let name_off = self.strings.intern(name);
        let sig_off = self.blobs.intern(&encode_method_sig(signature)?)?;

        let key = (class_rid, name_off, sig_off);
        if let Some(&existing) = self.methods.get(&key) {
            return Ok(existing);
        }

        let rid = self.tables.method_def.len() as u32 + 1;
        self.open_member_range(class_rid, rid, MemberKind::Method)?;

        let token = Token::from_parts(0x06, rid);
        self.tables.method_def.push(MethodDefRaw {
            rid,
            token,
            offset: 0,
            rva: 0,
            impl_flags,
            flags,
            name: name_off,
            signature: sig_off,
            param_list: 0,
        });
        self.methods.insert(key, token);
        Ok(token)
    }

    /// Add a Param row owned by `method`.
    ///
    /// Sequence 0 names the return value; parameters count from 1. Params
    /// of one method must be added contiguously and methods must receive
    /// them in MethodDef row order.
    ///
    /// # Errors
    /// Returns an error when the contiguity rules are violated
    pub fn param(&mut self, method: Token, sequence: u16, name: &str, flags: u16) -> Result<Token> {
        self.check_building()?;
        let method_rid = self.expect_row(method, TableId::MethodDef)?;

        let name_off = self.strings.intern(name);
        let rid = self.tables.param.len() as u32 + 1;
        self.open_member_range(method_rid, rid, MemberKind::Param)?;

        let token = Token::from_parts(0x08, rid);
        self.tables.param.push(ParamRaw {
            rid,
            token,
            offset: 0,
            flags,
            sequence,
            name: name_off,
        });
        Ok(token)
    }

    /// Add a GenericParam row for a type or method.
    ///
    /// ## Arguments
    /// * 'owner' - TypeDef or MethodDef token
    /// * 'number' - 0-based position referenced by `VAR`/`MVAR`
    /// * 'name' - Parameter name, e.g. `T`
    /// * 'flags' - GenericParamAttributes
    ///
    /// # Errors
    /// Returns an error when `owner` is neither TypeDef nor MethodDef
    pub fn generic_param(
        &mut self,
        owner: Token,
        number: u16,
        name: &str,
        flags: u16,
    ) -> Result<Token> {
        self.check_building()?;
        let owner_index = self.coded(owner, CodedIndexType::TypeOrMethodDef)?;
        let name_off = self.strings.intern(name);

        let rid = self.tables.generic_param.len() as u32 + 1;
        let token = Token::from_parts(0x2A, rid);
        self.tables.generic_param.push(GenericParamRaw {
            rid,
            token,
            offset: 0,
            number,
            flags,
            owner: owner_index,
            name: name_off,
        });
        Ok(token)
    }

    /// Constrain a GenericParam to a type.
    ///
    /// The returned token addresses the new row, e.g. as a
    /// [`CilAssembly::custom_attribute`] parent. The mandated table sort
    /// during `finish` may renumber the row; attributes attached to it are
    /// carried along.
    ///
    /// # Errors
    /// Returns an error when `owner` is not a GenericParam row or
    /// `constraint` is not a TypeDefOrRef target
    pub fn generic_param_constraint(&mut self, owner: Token, constraint: Token) -> Result<Token> {
        self.check_building()?;
        let owner_rid = self.expect_row(owner, TableId::GenericParam)?;
        let constraint_index = self.coded(constraint, CodedIndexType::TypeDefOrRef)?;

        let rid = self.tables.generic_param_constraint.len() as u32 + 1;
        let token = Token::from_parts(0x2C, rid);
        self.tables
            .generic_param_constraint
            .push(GenericParamConstraintRaw {
                rid,
                token,
                offset: 0,
                owner: owner_rid,
                constraint: constraint_index,
            });
        Ok(token)
    }

    /// Add a MemberRef row, deduplicated by `(parent, name, signature)`.
    ///
    /// ## Arguments
    /// * 'parent' - MemberRefParent token (TypeRef, TypeDef, TypeSpec,
    ///   ModuleRef or MethodDef)
    /// * 'name' - Member name
    /// * 'signature' - The raw member signature blob
    ///
    /// # Errors
    /// Returns an error when `parent` is not a legal MemberRefParent target
    pub fn member_ref(&mut self, parent: Token, name: &str, signature: &[u8]) -> Result<Token> {
        self.check_building()?;
        let parent_index = self.coded(parent, CodedIndexType::MemberRefParent)?;

        let name_off = self.strings.intern(name);
        let sig_off = self.blobs.intern(signature)?;

        let key = (parent.value(), name_off, sig_off);
        if let Some(&existing) = self.member_refs.get(&key) {
            return Ok(existing);
        }

        let rid = self.tables.member_ref.len() as u32 + 1;
        let token = Token::from_parts(0x0A, rid);
        self.tables.member_ref.push(MemberRefRaw {
            rid,
            token,
            offset: 0,
            class: parent_index,
            name: name_off,
            signature: sig_off,
        });
        self.member_refs.insert(key, token);
        Ok(token)
    }

    /// Add a MemberRef row for a method signature.
    ///
    /// # Errors
    /// See [`CilAssembly::member_ref`]
    pub fn method_ref(&mut self, parent: Token, name: &str, signature: &MethodSig) -> Result<Token> {
        let blob = encode_method_sig(signature)?;
        self.member_ref(parent, name, &blob)
    }

    /// Add a MemberRef row for a field signature.
    ///
    /// # Errors
    /// See [`CilAssembly::member_ref`]
    pub fn field_ref(&mut self, parent: Token, name: &str, signature: &FieldSig) -> Result<Token> {
        let blob = encode_field_sig(signature)?;
        self.member_ref(parent, name, &blob)
    }

    /// Add a TypeSpec row, deduplicated by signature blob.
    ///
    /// # Errors
    /// Returns an error when the signature cannot be encoded
    pub fn type_spec(&mut self, signature: &TypeSpecSig) -> Result<Token> {
        self.check_building()?;
        let sig_off = self.blobs.intern(&encode_type_spec_sig(signature)?)?;

        if let Some(&existing) = self.type_specs.get(&sig_off) {
            return Ok(existing);
        }

        let rid = self.tables.type_spec.len() as u32 + 1;
        let token = Token::from_parts(0x1B, rid);
        self.tables.type_spec.push(TypeSpecRaw {
            rid,
            token,
            offset: 0,
            signature: sig_off,
        });
        self.type_specs.insert(sig_off, token);
        Ok(token)
    }

    /// Add a MethodSpec row instantiating a generic method.
    ///
    /// # Errors
    /// Returns an error when `method` is neither MethodDef nor MemberRef
    pub fn method_spec(&mut self, method: Token, signature: &MethodSpecSig) -> Result<Token> {
        self.check_building()?;
        let method_index = self.coded(method, CodedIndexType::MethodDefOrRef)?;
        let sig_off = self.blobs.intern(&encode_method_spec_sig(signature)?)?;

        let key = (method.value(), sig_off);
        if let Some(&existing) = self.method_specs.get(&key) {
            return Ok(existing);
        }

        let rid = self.tables.method_spec.len() as u32 + 1;
        let token = Token::from_parts(0x2B, rid);
        self.tables.method_spec.push(MethodSpecRaw {
            rid,
            token,
            offset: 0,
            method: method_index,
            instantiation: sig_off,
        });
        self.method_specs.insert(key, token);
        Ok(token)
    }

    /// Add a StandAloneSig row over a raw signature blob.
    ///
    /// # Errors
    /// Returns an error after `finish`
    pub fn stand_alone_sig(&mut self, signature: &[u8]) -> Result<Token> {
        self.check_building()?;
        let sig_off = self.blobs.intern(signature)?;

        if let Some(&existing) = self.stand_alone_sigs.get(&sig_off) {
            return Ok(existing);
        }

        let rid = self.tables.stand_alone_sig.len() as u32 + 1;
        let token = Token::from_parts(0x11, rid);
        self.tables.stand_alone_sig.push(StandAloneSigRaw {
            rid,
            token,
            offset: 0,
            signature: sig_off,
        });
        self.stand_alone_sigs.insert(sig_off, token);
        Ok(token)
    }

    /// Add a StandAloneSig row for a local variable signature.
    ///
    /// The returned token goes into
    /// [`crate::assembly::BodyBuilder::set_local_var_sig`].
    ///
    /// # Errors
    /// Returns an error when the signature cannot be encoded
    pub fn local_var_sig(&mut self, signature: &LocalVarSig) -> Result<Token> {
        let blob = encode_local_var_sig(signature)?;
        self.stand_alone_sig(&blob)
    }

    /// Intern a string literal, returning its `ldstr` token (0x70 tag).
    ///
    /// # Errors
    /// Returns an error after `finish`
    pub fn user_string(&mut self, value: &str) -> Result<Token> {
        self.check_building()?;
        let offset = self.user_strings.intern(value)?;
        Ok(Token::new(0x7000_0000 | offset))
    }

    /// Attach a custom attribute to any attributable element.
    ///
    /// ## Arguments
    /// * 'parent' - Token of the decorated element
    /// * 'constructor' - MethodDef or MemberRef token of the attribute ctor
    /// * 'value' - The serialised argument blob, empty for none
    ///
    /// # Errors
    /// Returns an error when the parent or constructor is illegal
    pub fn custom_attribute(
        &mut self,
        parent: Token,
        constructor: Token,
        value: &[u8],
    ) -> Result<Token> {
        self.check_building()?;
        let parent_index = self.coded(parent, CodedIndexType::HasCustomAttribute)?;
        let ctor_index = self.coded(constructor, CodedIndexType::CustomAttributeType)?;
        let value_off = self.blobs.intern(value)?;

        let rid = self.tables.custom_attribute.len() as u32 + 1;
        let token = Token::from_parts(0x0C, rid);
        self.tables.custom_attribute.push(CustomAttributeRaw {
            rid,
            token,
            offset: 0,
            parent: parent_index,
            constructor: ctor_index,
            value: value_off,
        });
        Ok(token)
    }

    /// Attach a constant default value to a field, param or property.
    ///
    /// ## Arguments
    /// * 'parent' - Field, Param or Property token
    /// * 'base_type' - ELEMENT_TYPE of the value
    /// * 'value' - The little-endian value bytes
    ///
    /// # Errors
    /// Returns an error when `parent` cannot carry a constant
    pub fn constant(&mut self, parent: Token, base_type: u8, value: &[u8]) -> Result<Token> {
        self.check_building()?;
        let parent_index = self.coded(parent, CodedIndexType::HasConstant)?;
        let value_off = self.blobs.intern(value)?;

        let rid = self.tables.constant.len() as u32 + 1;
        let token = Token::from_parts(0x0B, rid);
        self.tables.constant.push(ConstantRaw {
            rid,
            token,
            offset: 0,
            base_type,
            parent: parent_index,
            value: value_off,
        });
        Ok(token)
    }

    /// Add a Property row owned by `class`; the PropertyMap row appears with
    /// the class's first property.
    ///
    /// # Errors
    /// Returns an error when the contiguity rules are violated
    pub fn property(
        &mut self,
        class: Token,
        name: &str,
        signature: &PropertySig,
        flags: u16,
    ) -> Result<Token> {
        self.check_building()?;
        let class_rid = self.expect_row(class, TableId::TypeDef)?;

        let name_off = self.strings.intern(name);
        let sig_off = self.blobs.intern(&encode_property_sig(signature)?)?;

        let rid = self.tables.property.len() as u32 + 1;
        if self.last_property_owner != Some(class_rid) {
            self.ensure_new_owner(self.last_property_owner, class_rid)?;
            let map_rid = self.tables.property_map.len() as u32 + 1;
            self.tables.property_map.push(PropertyMapRaw {
                rid: map_rid,
                token: Token::from_parts(0x15, map_rid),
                offset: 0,
                parent: class_rid,
                property_list: rid,
            });
            self.last_property_owner = Some(class_rid);
        }

        let token = Token::from_parts(0x17, rid);
        self.tables.property.push(PropertyRaw {
            rid,
            token,
            offset: 0,
            flags,
            name: name_off,
            signature: sig_off,
        });
        Ok(token)
    }

    /// Add an Event row owned by `class`; the EventMap row appears with the
    /// class's first event.
    ///
    /// # Errors
    /// Returns an error when the contiguity rules are violated
    pub fn event(
        &mut self,
        class: Token,
        name: &str,
        event_type: Token,
        flags: u16,
    ) -> Result<Token> {
        self.check_building()?;
        let class_rid = self.expect_row(class, TableId::TypeDef)?;
        let type_index = self.coded(event_type, CodedIndexType::TypeDefOrRef)?;
        let name_off = self.strings.intern(name);

        let rid = self.tables.event.len() as u32 + 1;
        if self.last_event_owner != Some(class_rid) {
            self.ensure_new_owner(self.last_event_owner, class_rid)?;
            let map_rid = self.tables.event_map.len() as u32 + 1;
            self.tables.event_map.push(EventMapRaw {
                rid: map_rid,
                token: Token::from_parts(0x12, map_rid),
                offset: 0,
                parent: class_rid,
                event_list: rid,
            });
            self.last_event_owner = Some(class_rid);
        }

        let token = Token::from_parts(0x14, rid);
        self.tables.event.push(EventRaw {
            rid,
            token,
            offset: 0,
            event_flags: flags,
            name: name_off,
            event_type: type_index,
        });
        Ok(token)
    }

    /// Attach an accessor method to an event or property.
    ///
    /// ## Arguments
    /// * 'association' - Event or Property token
    /// * 'method' - MethodDef token of the accessor
    /// * 'semantics' - Accessor kind: setter 0x01, getter 0x02, other 0x04,
    ///   add 0x08, remove 0x10, fire 0x20
    ///
    /// # Errors
    /// Returns an error when either token is invalid
    pub fn method_semantics(
        &mut self,
        association: Token,
        method: Token,
        semantics: u16,
    ) -> Result<()> {
        self.check_building()?;
        let association_index = self.coded(association, CodedIndexType::HasSemantics)?;
        let method_rid = self.expect_row(method, TableId::MethodDef)?;

        let rid = self.tables.method_semantics.len() as u32 + 1;
        self.tables.method_semantics.push(MethodSemanticsRaw {
            rid,
            token: Token::from_parts(0x18, rid),
            offset: 0,
            semantics,
            method: method_rid,
            association: association_index,
        });
        Ok(())
    }

    /// Record an explicit method override inside `class`.
    ///
    /// # Errors
    /// Returns an error when a token is invalid
    pub fn method_impl(&mut self, class: Token, body: Token, declaration: Token) -> Result<()> {
        self.check_building()?;
        let class_rid = self.expect_row(class, TableId::TypeDef)?;
        let body_index = self.coded(body, CodedIndexType::MethodDefOrRef)?;
        let declaration_index = self.coded(declaration, CodedIndexType::MethodDefOrRef)?;

        let rid = self.tables.method_impl.len() as u32 + 1;
        self.tables.method_impl.push(MethodImplRaw {
            rid,
            token: Token::from_parts(0x19, rid),
            offset: 0,
            class: class_rid,
            method_body: body_index,
            method_declaration: declaration_index,
        });
        Ok(())
    }

    /// Forward a member to a native module (P/Invoke).
    ///
    /// # Errors
    /// Returns an error when a token is invalid
    pub fn impl_map(
        &mut self,
        member: Token,
        mapping_flags: u16,
        import_name: &str,
        import_scope: Token,
    ) -> Result<()> {
        self.check_building()?;
        let member_index = self.coded(member, CodedIndexType::MemberForwarded)?;
        let scope_rid = self.expect_row(import_scope, TableId::ModuleRef)?;
        let name_off = self.strings.intern(import_name);

        let rid = self.tables.impl_map.len() as u32 + 1;
        self.tables.impl_map.push(ImplMapRaw {
            rid,
            token: Token::from_parts(0x1C, rid),
            offset: 0,
            mapping_flags,
            member_forwarded: member_index,
            import_name: name_off,
            import_scope: scope_rid,
        });
        Ok(())
    }

    /// Give a type an explicit layout.
    ///
    /// # Errors
    /// Returns an error when `class` is not a TypeDef row
    pub fn class_layout(&mut self, class: Token, packing: u16, size: u32) -> Result<()> {
        self.check_building()?;
        let class_rid = self.expect_row(class, TableId::TypeDef)?;

        let rid = self.tables.class_layout.len() as u32 + 1;
        self.tables.class_layout.push(ClassLayoutRaw {
            rid,
            token: Token::from_parts(0x0F, rid),
            offset: 0,
            packing_size: packing,
            class_size: size,
            parent: class_rid,
        });
        Ok(())
    }

    /// Position a field inside an explicit-layout type.
    ///
    /// # Errors
    /// Returns an error when `field` is not a Field row
    pub fn field_layout(&mut self, field: Token, byte_offset: u32) -> Result<()> {
        self.check_building()?;
        let field_rid = self.expect_row(field, TableId::Field)?;

        let rid = self.tables.field_layout.len() as u32 + 1;
        self.tables.field_layout.push(FieldLayoutRaw {
            rid,
            token: Token::from_parts(0x10, rid),
            offset: 0,
            field_offset: byte_offset,
            field: field_rid,
        });
        Ok(())
    }

    /// Attach a declarative security permission set to a type, method or
    /// assembly.
    ///
    /// The returned token addresses the new row, e.g. as a
    /// [`CilAssembly::custom_attribute`] parent. The mandated table sort
    /// during `finish` may renumber the row; attributes attached to it are
    /// carried along.
    ///
    /// ## Arguments
    /// * 'parent' - TypeDef, MethodDef or Assembly token
    /// * 'action' - SecurityAction code, e.g. 0x0008 for Demand
    /// * 'permission_set' - The serialised permission set blob
    ///
    /// # Errors
    /// Returns an error when `parent` cannot carry security declarations
    pub fn decl_security(
        &mut self,
        parent: Token,
        action: u16,
        permission_set: &[u8],
    ) -> Result<Token> {
        self.check_building()?;
        let parent_index = self.coded(parent, CodedIndexType::HasDeclSecurity)?;
        let blob_off = self.blobs.intern(permission_set)?;

        let rid = self.tables.decl_security.len() as u32 + 1;
        let token = Token::from_parts(0x0E, rid);
        self.tables.decl_security.push(DeclSecurityRaw {
            rid,
            token,
            offset: 0,
            action,
            parent: parent_index,
            permission_set: blob_off,
        });
        Ok(token)
    }

    /// Attach a marshalling descriptor to a field or param.
    ///
    /// # Errors
    /// Returns an error when `parent` cannot carry marshalling data
    pub fn field_marshal(&mut self, parent: Token, native_type: &[u8]) -> Result<()> {
        self.check_building()?;
        let parent_index = self.coded(parent, CodedIndexType::HasFieldMarshal)?;
        let blob_off = self.blobs.intern(native_type)?;

        let rid = self.tables.field_marshal.len() as u32 + 1;
        self.tables.field_marshal.push(FieldMarshalRaw {
            rid,
            token: Token::from_parts(0x0D, rid),
            offset: 0,
            parent: parent_index,
            native_type: blob_off,
        });
        Ok(())
    }

    /// Attach a serialised method body to a MethodDef.
    ///
    /// The body is serialised immediately — labels must all be bound — and
    /// placed into the image during `finish`, when its RVA becomes known.
    ///
    /// # Errors
    /// Returns an error when `method` is not a MethodDef row, already has a
    /// body, or the body fails to serialise
    pub fn method_body(&mut self, method: Token, body: &mut BodyBuilder) -> Result<()> {
        self.check_building()?;
        let method_rid = self.expect_row(method, TableId::MethodDef)?;

        if self.bodies.iter().any(|(rid, _)| *rid == method_rid) {
            return Err(ContractViolation("method already has a body"));
        }

        let bytes = body.serialize()?;
        self.bodies.push((method_rid, bytes));
        Ok(())
    }

    /// Sort tables, freeze sizes, and emit the complete PE image.
    ///
    /// After this call the builder is finished; any further contribution is
    /// a contract violation.
    ///
    /// # Errors
    /// Returns an error when member list ranges are inconsistent, a stored
    /// reference is illegal, or a column value does not fit its width
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        self.check_building()?;
        self.finished = true;

        self.close_member_ranges()?;
        self.tables.sort_required()?;

        emit::build_image(self)
    }

    /// Backfill the list columns of classes and methods that never received
    /// members, and verify the ranges are monotonic.
    fn close_member_ranges(&mut self) -> Result<()> {
        let field_end = self.tables.field.len() as u32 + 1;
        let method_end = self.tables.method_def.len() as u32 + 1;
        let param_end = self.tables.param.len() as u32 + 1;

        backfill(
            self.tables.type_def.iter_mut().map(|row| &mut row.field_list),
            field_end,
        )?;
        backfill(
            self.tables
                .type_def
                .iter_mut()
                .map(|row| &mut row.method_list),
            method_end,
        )?;
        backfill(
            self.tables
                .method_def
                .iter_mut()
                .map(|row| &mut row.param_list),
            param_end,
        )?;
        Ok(())
    }

    fn open_member_range(&mut self, owner_rid: u32, first_rid: u32, kind: MemberKind) -> Result<()> {
        let last_owner = match kind {
            MemberKind::Field => &mut self.last_field_owner,
            MemberKind::Method => &mut self.last_method_owner,
            MemberKind::Param => &mut self.last_param_owner,
        };

        if *last_owner == Some(owner_rid) {
            return Ok(());
        }
        if let Some(previous) = *last_owner {
            if owner_rid < previous {
                return Err(ContractViolation(
                    "members must be added in owner row order",
                ));
            }
        }
        *last_owner = Some(owner_rid);

        match kind {
            MemberKind::Field => {
                self.tables.type_def[owner_rid as usize - 1].field_list = first_rid;
            }
            MemberKind::Method => {
                self.tables.type_def[owner_rid as usize - 1].method_list = first_rid;
            }
            MemberKind::Param => {
                self.tables.method_def[owner_rid as usize - 1].param_list = first_rid;
            }
        }
        Ok(())
    }

    fn ensure_new_owner(&self, last: Option<u32>, owner_rid: u32) -> Result<()> {
        if let Some(previous) = last {
            if owner_rid <= previous {
                return Err(ContractViolation(
                    "members must be added in owner row order",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum MemberKind {
    Field,
    Method,
    Param,
}

/// Walk list columns in reverse, replacing the 0 sentinel of ownerless rows
/// with the start of the following range, and reject decreasing ranges.
fn backfill<'a>(columns: impl DoubleEndedIterator<Item = &'a mut u32>, end: u32) -> Result<()> {
    let mut next = end;
    for column in columns.rev() {
        if *column == 0 {
            *column = next;
        } else if *column > next {
            return Err(ContractViolation("member list ranges are not monotonic"));
        } else {
            next = *column;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::signatures::TypeSig;

    fn object_extends(asm: &mut CilAssembly) -> Token {
        let mscorlib = asm.assembly_ref("mscorlib", (4, 0, 0, 0), &[]).unwrap();
        asm.type_ref(mscorlib, "System", "Object").unwrap()
    }

    #[test]
    fn duplicate_field_returns_existing_token() {
        let mut asm = CilAssembly::new("Lib", (1, 0, 0, 0), "Lib.dll");
        let object = object_extends(&mut asm);
        let class = asm.class("Lib", "Holder", 0x0010_0001, object).unwrap();

        let sig = FieldSig {
            modifiers: Vec::new(),
            base: TypeSig::I4,
        };
        let first = asm.field(class, "value", &sig, 0x0001).unwrap();
        let second = asm.field(class, "value", &sig, 0x0001).unwrap();

        assert_eq!(first, second);
        assert_eq!(asm.tables.field.len(), 1);
    }

    #[test]
    fn interleaved_members_are_rejected() {
        let mut asm = CilAssembly::new("Lib", (1, 0, 0, 0), "Lib.dll");
        let object = object_extends(&mut asm);
        let first = asm.class("Lib", "A", 0x0010_0001, object).unwrap();
        let second = asm.class("Lib", "B", 0x0010_0001, object).unwrap();

        let sig = FieldSig {
            modifiers: Vec::new(),
            base: TypeSig::I4,
        };
        asm.field(second, "b1", &sig, 0x0001).unwrap();
        // Fields of A would now break B's contiguous range
        assert!(asm.field(first, "a1", &sig, 0x0001).is_err());
    }

    #[test]
    fn contribution_after_finish_is_fatal() {
        let mut asm = CilAssembly::new("Lib", (1, 0, 0, 0), "Lib.dll");
        asm.finish().unwrap();
        assert!(matches!(
            asm.assembly_ref("mscorlib", (4, 0, 0, 0), &[]),
            Err(ContractViolation(_))
        ));
    }

    #[test]
    fn member_list_backfill() {
        let mut asm = CilAssembly::new("Lib", (1, 0, 0, 0), "Lib.dll");
        let object = object_extends(&mut asm);
        // <Module> has no members; A gets one method; B none
        let class_a = asm.class("Lib", "A", 0x0010_0001, object).unwrap();
        let _class_b = asm.class("Lib", "B", 0x0010_0001, object).unwrap();

        let sig = MethodSig {
            return_type: crate::metadata::signatures::SigParam {
                base: TypeSig::Void,
                ..Default::default()
            },
            ..Default::default()
        };
        asm.method(class_a, "Run", &sig, 0x0086, 0).unwrap();

        asm.close_member_ranges().unwrap();

        // <Module> points at A's method range; B points past the end
        assert_eq!(asm.tables.type_def[0].method_list, 1);
        assert_eq!(asm.tables.type_def[1].method_list, 1);
        assert_eq!(asm.tables.type_def[2].method_list, 2);
        assert_eq!(asm.tables.type_def[0].field_list, 1);
    }

    #[test]
    fn user_string_tokens() {
        let mut asm = CilAssembly::new("Lib", (1, 0, 0, 0), "Lib.dll");
        let token = asm.user_string("hi").unwrap();
        assert_eq!(token.table(), 0x70);
        assert_eq!(asm.user_string("hi").unwrap(), token);
    }

    #[test]
    fn decl_security_rows() {
        let mut asm = CilAssembly::new("Lib", (1, 0, 0, 0), "Lib.dll");
        let object = object_extends(&mut asm);
        let class = asm.class("Lib", "Secured", 0x0010_0001, object).unwrap();

        let row = asm.decl_security(class, 0x0008, &[0x2E, 0x01]).unwrap();
        assert_eq!(row.table(), 0x0E);
        assert_eq!(asm.tables.decl_security.len(), 1);
        assert_eq!(asm.tables.decl_security[0].action, 0x0008);

        // Fields and params are not legal HasDeclSecurity parents
        let sig = FieldSig {
            modifiers: Vec::new(),
            base: TypeSig::I4,
        };
        let field = asm.field(class, "value", &sig, 0x0001).unwrap();
        assert!(asm.decl_security(field, 0x0008, &[]).is_err());
    }

    #[test]
    fn attributes_follow_interface_impl_rows_through_sort() {
        let mut asm = CilAssembly::new("Lib", (1, 0, 0, 0), "Lib.dll");
        let mscorlib = asm.assembly_ref("mscorlib", (4, 0, 0, 0), &[]).unwrap();
        let object = asm.type_ref(mscorlib, "System", "Object").unwrap();
        let disposable = asm.type_ref(mscorlib, "System", "IDisposable").unwrap();

        let ctor_sig = MethodSig {
            has_this: true,
            return_type: crate::metadata::signatures::SigParam {
                base: TypeSig::Void,
                ..Default::default()
            },
            ..Default::default()
        };
        let ctor = asm.method_ref(object, ".ctor", &ctor_sig).unwrap();

        // Classes in row order, implementations against class row order: the
        // mandated sort swaps the InterfaceImpl rows during finish
        let first = asm.class("Lib", "A", 0x0010_0001, object).unwrap();
        let second = asm.class("Lib", "B", 0x0010_0001, object).unwrap();
        let on_second = asm.interface_impl(second, disposable).unwrap();
        let on_first = asm.interface_impl(first, disposable).unwrap();
        assert_eq!(on_second.table(), 0x09);

        asm.custom_attribute(on_first, ctor, &[]).unwrap();
        asm.finish().unwrap();

        // `first`'s implementation moved from row 2 to row 1; its attribute
        // kept pointing at it
        assert_eq!(asm.tables.interface_impl[0].class, first.row());
        let attribute = &asm.tables.custom_attribute[0];
        assert_eq!(attribute.parent.tag, TableId::InterfaceImpl);
        assert_eq!(attribute.parent.row, 1);
    }

    #[test]
    fn generic_param_constraint_rows_are_addressable() {
        let mut asm = CilAssembly::new("Lib", (1, 0, 0, 0), "Lib.dll");
        let object = object_extends(&mut asm);
        let list = asm.class("Lib", "List`1", 0x0010_0001, object).unwrap();
        let param = asm.generic_param(list, 0, "T", 0).unwrap();

        let constraint = asm.generic_param_constraint(param, object).unwrap();
        assert_eq!(constraint.table(), 0x2C);
        assert_eq!(constraint.row(), 1);
        assert_eq!(asm.tables.generic_param_constraint.len(), 1);
    }
}
