//! Signature blob encoders, the write-side counterpart of the parser.
//!
//! Every function produces the exact byte layout ECMA-335 II.23.2 defines
//! for its signature kind; parsing an encoded blob yields a structurally
//! equal signature value.

use crate::{
    file::io::write_compressed_uint,
    metadata::{
        signatures::{
            FieldSig, LocalVarSig, MethodSig, MethodSpecSig, PropertySig, SigModifier, SigParam,
            TypeSig, TypeSpecSig,
        },
        token::Token,
        typesystem::{ELEMENT_TYPE, SIGNATURE},
    },
    Result,
};

/// Encode a token as a TypeDefOrRefOrSpec compressed value (II.23.2.8).
///
/// # Errors
/// Returns an error when the token's table is not TypeDef, TypeRef or
/// TypeSpec.
pub fn encode_type_token(token: Token, buffer: &mut Vec<u8>) -> Result<()> {
    let tag = match token.table() {
        0x02 => 0, // TypeDef
        0x01 => 1, // TypeRef
        0x1B => 2, // TypeSpec
        other => {
            return Err(malformed_error!(
                "Token table 0x{:02X} cannot appear inside a signature",
                other
            ))
        }
    };
    write_compressed_uint((token.row() << 2) | tag, buffer)
}

fn encode_custom_mods(mods: &[SigModifier], buffer: &mut Vec<u8>) -> Result<()> {
    for modifier in mods {
        buffer.push(if modifier.required {
            ELEMENT_TYPE::CMOD_REQD
        } else {
            ELEMENT_TYPE::CMOD_OPT
        });
        encode_type_token(modifier.modifier_type, buffer)?;
    }
    Ok(())
}

/// Encode one type into a signature buffer.
///
/// # Errors
/// Returns an error for tokens that cannot appear in signatures or counts
/// beyond the compressed range.
pub fn encode_type(sig: &TypeSig, buffer: &mut Vec<u8>) -> Result<()> {
    match sig {
        TypeSig::Void => buffer.push(ELEMENT_TYPE::VOID),
        TypeSig::Boolean => buffer.push(ELEMENT_TYPE::BOOLEAN),
        TypeSig::Char => buffer.push(ELEMENT_TYPE::CHAR),
        TypeSig::I1 => buffer.push(ELEMENT_TYPE::I1),
        TypeSig::U1 => buffer.push(ELEMENT_TYPE::U1),
        TypeSig::I2 => buffer.push(ELEMENT_TYPE::I2),
        TypeSig::U2 => buffer.push(ELEMENT_TYPE::U2),
        TypeSig::I4 => buffer.push(ELEMENT_TYPE::I4),
        TypeSig::U4 => buffer.push(ELEMENT_TYPE::U4),
        TypeSig::I8 => buffer.push(ELEMENT_TYPE::I8),
        TypeSig::U8 => buffer.push(ELEMENT_TYPE::U8),
        TypeSig::R4 => buffer.push(ELEMENT_TYPE::R4),
        TypeSig::R8 => buffer.push(ELEMENT_TYPE::R8),
        TypeSig::String => buffer.push(ELEMENT_TYPE::STRING),
        TypeSig::Object => buffer.push(ELEMENT_TYPE::OBJECT),
        TypeSig::TypedByRef => buffer.push(ELEMENT_TYPE::TYPEDBYREF),
        TypeSig::I => buffer.push(ELEMENT_TYPE::I),
        TypeSig::U => buffer.push(ELEMENT_TYPE::U),
        TypeSig::Sentinel => buffer.push(ELEMENT_TYPE::SENTINEL),
        TypeSig::Ptr(pointer) => {
            buffer.push(ELEMENT_TYPE::PTR);
            encode_custom_mods(&pointer.modifiers, buffer)?;
            encode_type(&pointer.base, buffer)?;
        }
        TypeSig::ByRef(inner) => {
            buffer.push(ELEMENT_TYPE::BYREF);
            encode_type(inner, buffer)?;
        }
        TypeSig::ValueType(token) => {
            buffer.push(ELEMENT_TYPE::VALUETYPE);
            encode_type_token(*token, buffer)?;
        }
        TypeSig::Class(token) => {
            buffer.push(ELEMENT_TYPE::CLASS);
            encode_type_token(*token, buffer)?;
        }
        TypeSig::GenericVarType(index) => {
            buffer.push(ELEMENT_TYPE::VAR);
            write_compressed_uint(*index, buffer)?;
        }
        TypeSig::GenericVarMethod(index) => {
            buffer.push(ELEMENT_TYPE::MVAR);
            write_compressed_uint(*index, buffer)?;
        }
        TypeSig::Array(array) => {
            buffer.push(ELEMENT_TYPE::ARRAY);
            encode_type(&array.base, buffer)?;
            write_compressed_uint(array.rank, buffer)?;

            let sizes: Vec<u32> = array
                .dimensions
                .iter()
                .filter_map(|dimension| dimension.size)
                .collect();
            #[allow(clippy::cast_possible_truncation)]
            write_compressed_uint(sizes.len() as u32, buffer)?;
            for size in sizes {
                write_compressed_uint(size, buffer)?;
            }

            let lo_bounds: Vec<u32> = array
                .dimensions
                .iter()
                .filter_map(|dimension| dimension.lower_bound)
                .collect();
            #[allow(clippy::cast_possible_truncation)]
            write_compressed_uint(lo_bounds.len() as u32, buffer)?;
            for bound in lo_bounds {
                write_compressed_uint(bound, buffer)?;
            }
        }
        TypeSig::GenericInst(base, args) => {
            buffer.push(ELEMENT_TYPE::GENERICINST);
            encode_type(base, buffer)?;
            #[allow(clippy::cast_possible_truncation)]
            write_compressed_uint(args.len() as u32, buffer)?;
            for arg in args {
                encode_type(arg, buffer)?;
            }
        }
        TypeSig::FnPtr(method) => {
            buffer.push(ELEMENT_TYPE::FNPTR);
            encode_method_sig_into(method, buffer)?;
        }
        TypeSig::SzArray(array) => {
            buffer.push(ELEMENT_TYPE::SZARRAY);
            encode_custom_mods(&array.modifiers, buffer)?;
            encode_type(&array.base, buffer)?;
        }
        TypeSig::Pinned(inner) => {
            buffer.push(ELEMENT_TYPE::PINNED);
            encode_type(inner, buffer)?;
        }
        TypeSig::Unknown => {
            return Err(malformed_error!("Cannot encode an unknown type signature"))
        }
    }
    Ok(())
}

fn encode_param(param: &SigParam, buffer: &mut Vec<u8>) -> Result<()> {
    encode_custom_mods(&param.modifiers, buffer)?;
    if param.by_ref {
        buffer.push(ELEMENT_TYPE::BYREF);
    }
    encode_type(&param.base, buffer)
}

fn encode_method_sig_into(sig: &MethodSig, buffer: &mut Vec<u8>) -> Result<()> {
    let mut convention = sig.call_conv & SIGNATURE::CALLCONV_MASK;
    if sig.has_this {
        convention |= SIGNATURE::HASTHIS;
    }
    if sig.explicit_this {
        convention |= SIGNATURE::EXPLICITTHIS;
    }
    if sig.generic_param_count > 0 {
        convention |= SIGNATURE::GENERIC;
    }
    buffer.push(convention);

    if sig.generic_param_count > 0 {
        write_compressed_uint(sig.generic_param_count, buffer)?;
    }

    #[allow(clippy::cast_possible_truncation)]
    write_compressed_uint((sig.params.len() + sig.varargs.len()) as u32, buffer)?;
    encode_param(&sig.return_type, buffer)?;
    for param in &sig.params {
        encode_param(param, buffer)?;
    }

    if !sig.varargs.is_empty() {
        buffer.push(ELEMENT_TYPE::SENTINEL);
        for param in &sig.varargs {
            encode_param(param, buffer)?;
        }
    }

    Ok(())
}

/// Encode a method signature blob (II.23.2.1 / II.23.2.2 / II.23.2.3).
///
/// # Errors
/// Returns an error when any contained type cannot be encoded.
pub fn encode_method_sig(sig: &MethodSig) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    encode_method_sig_into(sig, &mut buffer)?;
    Ok(buffer)
}

/// Encode a field signature blob (II.23.2.4).
///
/// # Errors
/// Returns an error when the field type cannot be encoded.
pub fn encode_field_sig(sig: &FieldSig) -> Result<Vec<u8>> {
    let mut buffer = vec![SIGNATURE::FIELD];
    encode_custom_mods(&sig.modifiers, &mut buffer)?;
    encode_type(&sig.base, &mut buffer)?;
    Ok(buffer)
}

/// Encode a property signature blob (II.23.2.5).
///
/// # Errors
/// Returns an error when the property type or a parameter cannot be encoded.
pub fn encode_property_sig(sig: &PropertySig) -> Result<Vec<u8>> {
    let mut head = SIGNATURE::PROPERTY;
    if sig.has_this {
        head |= SIGNATURE::HASTHIS;
    }

    let mut buffer = vec![head];
    #[allow(clippy::cast_possible_truncation)]
    write_compressed_uint(sig.params.len() as u32, &mut buffer)?;
    encode_custom_mods(&sig.modifiers, &mut buffer)?;
    encode_type(&sig.base, &mut buffer)?;
    for param in &sig.params {
        encode_param(param, &mut buffer)?;
    }
    Ok(buffer)
}

/// Encode a local variable signature blob (II.23.2.6).
///
/// # Errors
/// Returns an error when a variable type cannot be encoded.
pub fn encode_local_var_sig(sig: &LocalVarSig) -> Result<Vec<u8>> {
    let mut buffer = vec![SIGNATURE::LOCAL_SIG];
    #[allow(clippy::cast_possible_truncation)]
    write_compressed_uint(sig.locals.len() as u32, &mut buffer)?;

    for local in &sig.locals {
        if local.base == TypeSig::TypedByRef {
            buffer.push(ELEMENT_TYPE::TYPEDBYREF);
            continue;
        }

        encode_custom_mods(&local.modifiers, &mut buffer)?;
        if local.pinned {
            buffer.push(ELEMENT_TYPE::PINNED);
        }
        if local.by_ref {
            buffer.push(ELEMENT_TYPE::BYREF);
        }
        encode_type(&local.base, &mut buffer)?;
    }

    Ok(buffer)
}

/// Encode a type specification signature blob (II.23.2.14).
///
/// # Errors
/// Returns an error when the type cannot be encoded.
pub fn encode_type_spec_sig(sig: &TypeSpecSig) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    encode_type(&sig.base, &mut buffer)?;
    Ok(buffer)
}

/// Encode a method specification signature blob (II.23.2.15).
///
/// # Errors
/// Returns an error when an argument type cannot be encoded.
pub fn encode_method_spec_sig(sig: &MethodSpecSig) -> Result<Vec<u8>> {
    let mut buffer = vec![SIGNATURE::GENERICINST];
    #[allow(clippy::cast_possible_truncation)]
    write_compressed_uint(sig.generic_args.len() as u32, &mut buffer)?;
    for arg in &sig.generic_args {
        encode_type(arg, &mut buffer)?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::signatures::{LocalVar, SignatureReader, SigSzArray};

    #[test]
    fn method_sig_round_trip() {
        let sig = MethodSig {
            has_this: true,
            explicit_this: false,
            call_conv: SIGNATURE::CALLCONV_DEFAULT,
            generic_param_count: 0,
            return_type: SigParam {
                base: TypeSig::Void,
                ..Default::default()
            },
            params: vec![
                SigParam {
                    base: TypeSig::String,
                    ..Default::default()
                },
                SigParam {
                    base: TypeSig::SzArray(SigSzArray {
                        modifiers: Vec::new(),
                        base: Box::new(TypeSig::I4),
                    }),
                    ..Default::default()
                },
            ],
            varargs: Vec::new(),
        };

        let blob = encode_method_sig(&sig).unwrap();
        let reread = SignatureReader::new(&blob).read_method_sig().unwrap();
        assert_eq!(reread, sig);
    }

    #[test]
    fn generic_method_sig_round_trip() {
        let sig = MethodSig {
            has_this: false,
            explicit_this: false,
            call_conv: SIGNATURE::CALLCONV_DEFAULT,
            generic_param_count: 2,
            return_type: SigParam {
                base: TypeSig::GenericVarMethod(1),
                ..Default::default()
            },
            params: vec![SigParam {
                base: TypeSig::GenericVarMethod(0),
                ..Default::default()
            }],
            varargs: Vec::new(),
        };

        let blob = encode_method_sig(&sig).unwrap();
        assert_eq!(blob[0] & SIGNATURE::GENERIC, SIGNATURE::GENERIC);
        let reread = SignatureReader::new(&blob).read_method_sig().unwrap();
        assert_eq!(reread, sig);
    }

    #[test]
    fn field_sig_round_trip_with_modifier() {
        let sig = FieldSig {
            modifiers: vec![SigModifier {
                required: true,
                modifier_type: Token::new(0x0100_0003),
            }],
            base: TypeSig::I8,
        };

        let blob = encode_field_sig(&sig).unwrap();
        let reread = SignatureReader::new(&blob).read_field_sig().unwrap();
        assert_eq!(reread, sig);
    }

    #[test]
    fn local_var_sig_round_trip() {
        let sig = LocalVarSig {
            locals: vec![
                LocalVar {
                    base: TypeSig::I4,
                    ..Default::default()
                },
                LocalVar {
                    pinned: true,
                    base: TypeSig::Object,
                    ..Default::default()
                },
                LocalVar {
                    by_ref: true,
                    base: TypeSig::R8,
                    ..Default::default()
                },
            ],
        };

        let blob = encode_local_var_sig(&sig).unwrap();
        let reread = SignatureReader::new(&blob).read_local_var_sig().unwrap();
        assert_eq!(reread, sig);
    }

    #[test]
    fn vararg_sentinel_round_trip() {
        let sig = MethodSig {
            call_conv: SIGNATURE::CALLCONV_VARARG,
            return_type: SigParam {
                base: TypeSig::Void,
                ..Default::default()
            },
            params: vec![SigParam {
                base: TypeSig::I4,
                ..Default::default()
            }],
            varargs: vec![SigParam {
                base: TypeSig::String,
                ..Default::default()
            }],
            ..Default::default()
        };

        let blob = encode_method_sig(&sig).unwrap();
        let reread = SignatureReader::new(&blob).read_method_sig().unwrap();
        assert_eq!(reread, sig);
    }

    #[test]
    fn rejects_bad_signature_token() {
        // MethodDef tokens cannot be encoded inside a type signature
        let mut buffer = Vec::new();
        assert!(encode_type_token(Token::new(0x0600_0001), &mut buffer).is_err());
    }
}
