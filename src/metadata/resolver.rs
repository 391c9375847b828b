//! The resolution pass: raw rows to a linked object model.
//!
//! [`resolve`] visits every materialised row of a [`CilImage`] once and
//! replaces stored indexes with direct data: heap offsets become strings and
//! decoded signatures, member list ranges become per-type member vectors,
//! method RVAs become decoded bodies with instruction lists. Indexes
//! pointing at row 0 resolve to `None`; indexes pointing past a table are a
//! load error, reported with the offending token.

use crate::{
    assembly::{decode_il, Instruction, Operand},
    metadata::{
        image::CilImage,
        method::ExceptionHandler,
        signatures::{FieldSig, LocalVarSig, MethodSig, SignatureReader},
        tables::{TableId, TableSet},
        token::Token,
    },
    Result,
};

/// The linked object model of one image.
///
/// Entities reference each other by [`Token`]; the vectors are indexed by
/// `row - 1`, so a token resolves to its entity with one bounds-checked
/// lookup. Back references (nested type to enclosing type) are plain tokens
/// and carry no ownership.
pub struct ObjectModel {
    /// The module row: name and MVID
    pub module: ModuleInfo,
    /// The assembly manifest, absent for netmodules
    pub assembly: Option<AssemblyInfo>,
    /// Referenced assemblies, indexed by row - 1
    pub assembly_refs: Vec<AssemblyRefInfo>,
    /// Referenced types, indexed by row - 1
    pub type_refs: Vec<TypeRefInfo>,
    /// Defined types with their members, indexed by row - 1
    pub types: Vec<TypeInfo>,
    /// Member references, indexed by row - 1
    pub member_refs: Vec<MemberRefInfo>,
}

/// Name and identity of the module
pub struct ModuleInfo {
    /// Module file name
    pub name: String,
    /// Module version identifier
    pub mvid: uguid::Guid,
}

/// The assembly manifest row, dereferenced
pub struct AssemblyInfo {
    /// Simple name
    pub name: String,
    /// `(major, minor, build, revision)`
    pub version: (u16, u16, u16, u16),
    /// AssemblyFlags
    pub flags: u32,
    /// Culture, empty for neutral
    pub culture: String,
    /// Public key bytes, empty when unsigned
    pub public_key: Vec<u8>,
}

/// One AssemblyRef row, dereferenced
pub struct AssemblyRefInfo {
    /// Token of the row
    pub token: Token,
    /// Simple name of the referenced assembly
    pub name: String,
    /// `(major, minor, build, revision)`
    pub version: (u16, u16, u16, u16),
    /// Public key or token bytes
    pub public_key_or_token: Vec<u8>,
}

/// One TypeRef row, dereferenced
pub struct TypeRefInfo {
    /// Token of the row
    pub token: Token,
    /// Token of the resolution scope, `None` for the null scope
    pub scope: Option<Token>,
    /// Namespace, empty for none
    pub namespace: String,
    /// Type name
    pub name: String,
}

/// One TypeDef row with its owned members resolved
pub struct TypeInfo {
    /// Token of the row
    pub token: Token,
    /// TypeAttributes
    pub flags: u32,
    /// Namespace, empty for none
    pub namespace: String,
    /// Type name
    pub name: String,
    /// Base type token, `None` for interfaces and `<Module>`
    pub extends: Option<Token>,
    /// Owned fields, in row order
    pub fields: Vec<FieldInfo>,
    /// Owned methods, in row order
    pub methods: Vec<MethodInfo>,
    /// Implemented interfaces, as TypeDefOrRef tokens
    pub interfaces: Vec<Token>,
    /// Generic parameters, sorted by number
    pub generic_params: Vec<GenericParamInfo>,
    /// Types nested inside this one
    pub nested_types: Vec<Token>,
    /// Enclosing type for nested types; a non-owning back reference
    pub enclosing: Option<Token>,
}

/// One Field row, dereferenced
pub struct FieldInfo {
    /// Token of the row
    pub token: Token,
    /// FieldAttributes
    pub flags: u16,
    /// Field name
    pub name: String,
    /// Decoded field signature
    pub signature: FieldSig,
}

/// One MethodDef row with params and body resolved
pub struct MethodInfo {
    /// Token of the row
    pub token: Token,
    /// MethodAttributes
    pub flags: u16,
    /// MethodImplAttributes
    pub impl_flags: u16,
    /// Method name
    pub name: String,
    /// Decoded method signature
    pub signature: MethodSig,
    /// Param rows of this method, in sequence order as stored
    pub params: Vec<ParamInfo>,
    /// Generic parameters, sorted by number
    pub generic_params: Vec<GenericParamInfo>,
    /// The decoded body, `None` for abstract/extern methods
    pub body: Option<MethodBodyInfo>,
}

/// One Param row, dereferenced
pub struct ParamInfo {
    /// Token of the row
    pub token: Token,
    /// ParamAttributes
    pub flags: u16,
    /// Position: 0 is the return value
    pub sequence: u16,
    /// Parameter name, empty when unnamed
    pub name: String,
}

/// One GenericParam row, dereferenced
pub struct GenericParamInfo {
    /// Token of the row
    pub token: Token,
    /// 0-based position referenced by `VAR`/`MVAR`
    pub number: u16,
    /// GenericParamAttributes
    pub flags: u16,
    /// Parameter name
    pub name: String,
    /// Constraint types, as TypeDefOrRef tokens
    pub constraints: Vec<Token>,
}

/// One MemberRef row, dereferenced
pub struct MemberRefInfo {
    /// Token of the row
    pub token: Token,
    /// MemberRefParent token of the declaring scope
    pub parent: Token,
    /// Member name
    pub name: String,
    /// Raw signature blob
    pub signature: Vec<u8>,
}

/// A decoded method body with its instruction list
pub struct MethodBodyInfo {
    /// Maximum operand stack depth
    pub max_stack: usize,
    /// StandAloneSig token of the locals signature, 0 for none
    pub local_var_sig_token: u32,
    /// Decoded local variable slots, empty without a locals signature
    pub locals: LocalVarSig,
    /// True when locals are zero-initialised
    pub init_locals: bool,
    /// The decoded instructions, branch targets as absolute offsets
    pub instructions: Vec<Instruction>,
    /// Exception handling clauses in section order
    pub exception_handlers: Vec<ExceptionHandler>,
    /// IL byte size of the body
    pub code_size: usize,
}

impl ObjectModel {
    /// Find a defined type by token
    #[must_use]
    pub fn type_by_token(&self, token: Token) -> Option<&TypeInfo> {
        if token.table() != 0x02 {
            return None;
        }
        self.types.get(token.row() as usize - 1)
    }

    /// The fully qualified name of a defined type: `Namespace.Name`, with
    /// nesting rendered as `Enclosing+Nested`
    #[must_use]
    pub fn type_full_name(&self, token: Token) -> Option<String> {
        let info = self.type_by_token(token)?;
        if let Some(enclosing) = info.enclosing {
            let outer = self.type_full_name(enclosing)?;
            return Some(format!("{}+{}", outer, info.name));
        }
        if info.namespace.is_empty() {
            Some(info.name.clone())
        } else {
            Some(format!("{}.{}", info.namespace, info.name))
        }
    }
}

fn check_row(tables: &TableSet, token: Token) -> Result<()> {
    let Some(table) = TableId::from_u8(token.table()) else {
        return Err(crate::Error::RowNotFound(token));
    };
    if token.row() == 0 || token.row() > tables.row_count(table) {
        return Err(crate::Error::RowNotFound(token));
    }
    Ok(())
}

/// Validate that every token embedded in decoded IL references an existing
/// row (or, for `ldstr`, a decodable user string).
fn check_il_tokens(image: &CilImage, instructions: &[Instruction]) -> Result<()> {
    for instruction in instructions {
        if let Operand::Token(token) = instruction.operand {
            if token.table() == 0x70 {
                image.user_strings()?.get(token.row() as usize)?;
            } else {
                check_row(image.tables(), token)?;
            }
        }
    }
    Ok(())
}

/// Run the full resolution pass over a loaded image.
///
/// # Errors
/// Fails on out-of-range references, malformed signatures and undecodable
/// method bodies; the model under construction is discarded.
pub fn resolve(image: &CilImage) -> Result<ObjectModel> {
    let tables = image.tables();
    let strings = image.strings()?;
    let blobs = image.blobs()?;
    let guids = image.guids()?;

    let module = match tables.module.first() {
        Some(row) => ModuleInfo {
            name: strings.get(row.name as usize)?.to_string(),
            mvid: if row.mvid == 0 {
                uguid::Guid::ZERO
            } else {
                guids.get(row.mvid as usize)?
            },
        },
        None => return Err(malformed_error!("Image carries no Module row")),
    };

    let assembly = match tables.assembly.first() {
        Some(row) => Some(AssemblyInfo {
            name: strings.get(row.name as usize)?.to_string(),
            version: (
                row.major_version,
                row.minor_version,
                row.build_number,
                row.revision_number,
            ),
            flags: row.flags,
            culture: strings.get(row.culture as usize)?.to_string(),
            public_key: blobs.get(row.public_key as usize)?.to_vec(),
        }),
        None => None,
    };

    let mut assembly_refs = Vec::with_capacity(tables.assembly_ref.len());
    for row in &tables.assembly_ref {
        assembly_refs.push(AssemblyRefInfo {
            token: row.token,
            name: strings.get(row.name as usize)?.to_string(),
            version: (
                row.major_version,
                row.minor_version,
                row.build_number,
                row.revision_number,
            ),
            public_key_or_token: blobs.get(row.public_key_or_token as usize)?.to_vec(),
        });
    }

    let mut type_refs = Vec::with_capacity(tables.type_ref.len());
    for row in &tables.type_ref {
        let scope = if row.resolution_scope.is_null() {
            None
        } else {
            check_row(tables, row.resolution_scope.token)?;
            Some(row.resolution_scope.token)
        };
        type_refs.push(TypeRefInfo {
            token: row.token,
            scope,
            namespace: strings.get(row.type_namespace as usize)?.to_string(),
            name: strings.get(row.type_name as usize)?.to_string(),
        });
    }

    let mut member_refs = Vec::with_capacity(tables.member_ref.len());
    for row in &tables.member_ref {
        check_row(tables, row.class.token)?;
        member_refs.push(MemberRefInfo {
            token: row.token,
            parent: row.class.token,
            name: strings.get(row.name as usize)?.to_string(),
            signature: blobs.get(row.signature as usize)?.to_vec(),
        });
    }

    // Member ranges: each type's fields/methods run to the next type's list
    let type_count = tables.type_def.len();
    let mut types = Vec::with_capacity(type_count);
    for (index, row) in tables.type_def.iter().enumerate() {
        let extends = if row.extends.is_null() {
            None
        } else {
            check_row(tables, row.extends.token)?;
            Some(row.extends.token)
        };

        let field_end = tables
            .type_def
            .get(index + 1)
            .map_or(tables.field.len() as u32 + 1, |next| next.field_list);
        let method_end = tables
            .type_def
            .get(index + 1)
            .map_or(tables.method_def.len() as u32 + 1, |next| next.method_list);

        let fields = resolve_fields(tables, &strings, &blobs, row.field_list, field_end)?;
        let methods =
            resolve_methods(image, tables, &strings, &blobs, row.method_list, method_end)?;

        types.push(TypeInfo {
            token: row.token,
            flags: row.flags,
            namespace: strings.get(row.type_namespace as usize)?.to_string(),
            name: strings.get(row.type_name as usize)?.to_string(),
            extends,
            fields,
            methods,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            nested_types: Vec::new(),
            enclosing: None,
        });
    }

    for row in &tables.interface_impl {
        let type_index = row.class as usize;
        if type_index == 0 || type_index > types.len() {
            return Err(crate::Error::RowNotFound(Token::from_parts(0x02, row.class)));
        }
        check_row(tables, row.interface.token)?;
        types[type_index - 1].interfaces.push(row.interface.token);
    }

    // Nesting: direct reference one way, non-owning back pointer the other
    for row in &tables.nested_class {
        let nested = row.nested_class as usize;
        let enclosing = row.enclosing_class as usize;
        if nested == 0 || nested > types.len() {
            return Err(crate::Error::RowNotFound(Token::from_parts(
                0x02,
                row.nested_class,
            )));
        }
        if enclosing == 0 || enclosing > types.len() {
            return Err(crate::Error::RowNotFound(Token::from_parts(
                0x02,
                row.enclosing_class,
            )));
        }
        types[enclosing - 1]
            .nested_types
            .push(Token::from_parts(0x02, row.nested_class));
        types[nested - 1].enclosing = Some(Token::from_parts(0x02, row.enclosing_class));
    }

    // Generic parameters attach to their type or method owner
    for row in &tables.generic_param {
        let mut constraints = Vec::new();
        for constraint in &tables.generic_param_constraint {
            if constraint.owner == row.rid {
                check_row(tables, constraint.constraint.token)?;
                constraints.push(constraint.constraint.token);
            }
        }

        let info = GenericParamInfo {
            token: row.token,
            number: row.number,
            flags: row.flags,
            name: strings.get(row.name as usize)?.to_string(),
            constraints,
        };

        match row.owner.tag {
            TableId::TypeDef => {
                let index = row.owner.row as usize;
                if index == 0 || index > types.len() {
                    return Err(crate::Error::RowNotFound(row.owner.token));
                }
                types[index - 1].generic_params.push(info);
            }
            TableId::MethodDef => {
                let target = row.owner.token;
                let mut placed = false;
                'outer: for ty in &mut types {
                    for method in &mut ty.methods {
                        if method.token == target {
                            method.generic_params.push(info);
                            placed = true;
                            break 'outer;
                        }
                    }
                }
                if !placed {
                    return Err(crate::Error::RowNotFound(target));
                }
            }
            _ => return Err(crate::Error::RowNotFound(row.owner.token)),
        }
    }

    for ty in &mut types {
        ty.generic_params.sort_by_key(|param| param.number);
        for method in &mut ty.methods {
            method.generic_params.sort_by_key(|param| param.number);
        }
    }

    Ok(ObjectModel {
        module,
        assembly,
        assembly_refs,
        type_refs,
        types,
        member_refs,
    })
}

fn resolve_fields(
    tables: &TableSet,
    strings: &crate::metadata::streams::Strings<'_>,
    blobs: &crate::metadata::streams::Blob<'_>,
    first: u32,
    end: u32,
) -> Result<Vec<FieldInfo>> {
    if first == 0 {
        return Err(malformed_error!("TypeDef row carries a null field list"));
    }

    let mut fields = Vec::new();
    for rid in first..end {
        let Some(row) = tables.field.get(rid as usize - 1) else {
            return Err(crate::Error::RowNotFound(Token::from_parts(0x04, rid)));
        };

        let blob = blobs.get(row.signature as usize)?;
        fields.push(FieldInfo {
            token: row.token,
            flags: row.flags,
            name: strings.get(row.name as usize)?.to_string(),
            signature: SignatureReader::new(blob).read_field_sig()?,
        });
    }
    Ok(fields)
}

fn resolve_methods(
    image: &CilImage,
    tables: &TableSet,
    strings: &crate::metadata::streams::Strings<'_>,
    blobs: &crate::metadata::streams::Blob<'_>,
    first: u32,
    end: u32,
) -> Result<Vec<MethodInfo>> {
    if first == 0 {
        return Err(malformed_error!("TypeDef row carries a null method list"));
    }

    let mut methods = Vec::new();
    for rid in first..end {
        let Some(row) = tables.method_def.get(rid as usize - 1) else {
            return Err(crate::Error::RowNotFound(Token::from_parts(0x06, rid)));
        };

        let param_end = tables
            .method_def
            .get(rid as usize)
            .map_or(tables.param.len() as u32 + 1, |next| next.param_list);

        if row.param_list == 0 {
            return Err(malformed_error!("MethodDef row carries a null param list"));
        }

        let mut params = Vec::new();
        for param_rid in row.param_list..param_end {
            let Some(param_row) = tables.param.get(param_rid as usize - 1) else {
                return Err(crate::Error::RowNotFound(Token::from_parts(0x08, param_rid)));
            };
            params.push(ParamInfo {
                token: param_row.token,
                flags: param_row.flags,
                sequence: param_row.sequence,
                name: strings.get(param_row.name as usize)?.to_string(),
            });
        }

        let signature_blob = blobs.get(row.signature as usize)?;
        let signature = SignatureReader::new(signature_blob).read_method_sig()?;

        let body = if row.rva == 0 {
            None
        } else {
            Some(resolve_body(image, blobs, row.rva)?)
        };

        methods.push(MethodInfo {
            token: row.token,
            flags: row.flags,
            impl_flags: row.impl_flags,
            name: strings.get(row.name as usize)?.to_string(),
            signature,
            params,
            generic_params: Vec::new(),
            body,
        });
    }
    Ok(methods)
}

fn resolve_body(
    image: &CilImage,
    blobs: &crate::metadata::streams::Blob<'_>,
    rva: u32,
) -> Result<MethodBodyInfo> {
    let slice = image.body_slice(rva)?;
    let header = crate::metadata::method::MethodBody::parse(slice)?;
    let code = header.code(slice)?;

    let instructions = decode_il(code)?;
    check_il_tokens(image, &instructions)?;

    let locals = if header.local_var_sig_token == 0 {
        LocalVarSig::default()
    } else {
        let token = Token::new(header.local_var_sig_token);
        if token.table() != 0x11 {
            return Err(malformed_error!(
                "Local variable signature token {} is not a StandAloneSig",
                token
            ));
        }
        check_row(image.tables(), token)?;
        let row = &image.tables().stand_alone_sig[token.row() as usize - 1];
        SignatureReader::new(blobs.get(row.signature as usize)?).read_local_var_sig()?
    };

    Ok(MethodBodyInfo {
        max_stack: header.max_stack,
        local_var_sig_token: header.local_var_sig_token,
        locals,
        init_locals: header.is_init_local,
        instructions,
        exception_handlers: header.exception_handlers,
        code_size: header.size_code,
    })
}
