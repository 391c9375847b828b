use crate::{
    file::parser::Parser,
    metadata::{
        signatures::{
            FieldSig, LocalVar, LocalVarSig, MethodSig, MethodSpecSig, PropertySig, SigArray,
            SigModifier, SigParam, SigPointer, SigSzArray, TypeSig, TypeSpecSig,
        },
        typesystem::{ArrayDimension, ELEMENT_TYPE, SIGNATURE},
    },
    Error::RecursionLimit,
    Result,
};

/// Maximum recursion depth for signature parsing
const MAX_RECURSION_DEPTH: usize = 50;

/// Parser for every signature blob variant of ECMA-335 II.23.2.
///
/// # Example
///
/// ```rust
/// use cilforge::metadata::signatures::SignatureReader;
/// let data = &[0x00, 0x01, 0x01, 0x0E];
/// let sig = SignatureReader::new(data).read_method_sig().unwrap();
/// assert_eq!(sig.params.len(), 1);
/// ```
///
/// A reader instance decodes exactly one signature; create a fresh one per
/// blob.
pub struct SignatureReader<'a> {
    parser: Parser<'a>,
    depth: usize,
}

impl<'a> SignatureReader<'a> {
    /// Create a `SignatureReader` over one signature blob
    ///
    /// ## Arguments
    /// * 'data' - The blob payload, without its length prefix
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        SignatureReader {
            parser: Parser::new(data),
            depth: 0,
        }
    }

    /// Parse a single type from the signature blob
    fn read_type(&mut self) -> Result<TypeSig> {
        self.depth += 1;
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let current_byte = self.parser.read_le::<u8>()?;
        let result = match current_byte {
            ELEMENT_TYPE::VOID => Ok(TypeSig::Void),
            ELEMENT_TYPE::BOOLEAN => Ok(TypeSig::Boolean),
            ELEMENT_TYPE::CHAR => Ok(TypeSig::Char),
            ELEMENT_TYPE::I1 => Ok(TypeSig::I1),
            ELEMENT_TYPE::U1 => Ok(TypeSig::U1),
            ELEMENT_TYPE::I2 => Ok(TypeSig::I2),
            ELEMENT_TYPE::U2 => Ok(TypeSig::U2),
            ELEMENT_TYPE::I4 => Ok(TypeSig::I4),
            ELEMENT_TYPE::U4 => Ok(TypeSig::U4),
            ELEMENT_TYPE::I8 => Ok(TypeSig::I8),
            ELEMENT_TYPE::U8 => Ok(TypeSig::U8),
            ELEMENT_TYPE::R4 => Ok(TypeSig::R4),
            ELEMENT_TYPE::R8 => Ok(TypeSig::R8),
            ELEMENT_TYPE::STRING => Ok(TypeSig::String),
            ELEMENT_TYPE::PTR => Ok(TypeSig::Ptr(SigPointer {
                modifiers: self.read_custom_mods()?,
                base: Box::new(self.read_type()?),
            })),
            ELEMENT_TYPE::BYREF => Ok(TypeSig::ByRef(Box::new(self.read_type()?))),
            ELEMENT_TYPE::VALUETYPE => {
                Ok(TypeSig::ValueType(self.parser.read_compressed_token()?))
            }
            ELEMENT_TYPE::CLASS => Ok(TypeSig::Class(self.parser.read_compressed_token()?)),
            ELEMENT_TYPE::VAR => Ok(TypeSig::GenericVarType(self.parser.read_compressed_uint()?)),
            ELEMENT_TYPE::ARRAY => {
                let elem_type = self.read_type()?;
                let rank = self.parser.read_compressed_uint()?;

                let num_sizes = self.parser.read_compressed_uint()?;
                let mut dimensions: Vec<ArrayDimension> = Vec::with_capacity(num_sizes as usize);
                for _ in 0..num_sizes {
                    dimensions.push(ArrayDimension {
                        size: Some(self.parser.read_compressed_uint()?),
                        lower_bound: None,
                    });
                }

                let num_lo_bounds = self.parser.read_compressed_uint()?;
                for index in 0..num_lo_bounds {
                    let lower_bound = self.parser.read_compressed_uint()?;
                    match dimensions.get_mut(index as usize) {
                        Some(dimension) => dimension.lower_bound = Some(lower_bound),
                        None => dimensions.push(ArrayDimension {
                            size: None,
                            lower_bound: Some(lower_bound),
                        }),
                    }
                }

                Ok(TypeSig::Array(SigArray {
                    base: Box::new(elem_type),
                    rank,
                    dimensions,
                }))
            }
            ELEMENT_TYPE::GENERICINST => {
                let next = self.parser.peek_byte()?;
                if next != ELEMENT_TYPE::CLASS && next != ELEMENT_TYPE::VALUETYPE {
                    return Err(malformed_error!(
                        "GENERICINST base is neither CLASS nor VALUETYPE - {}",
                        next
                    ));
                }

                let base_type = self.read_type()?;
                let arg_count = self.parser.read_compressed_uint()?;

                let mut type_args = Vec::with_capacity(arg_count as usize);
                for _ in 0..arg_count {
                    type_args.push(self.read_type()?);
                }

                Ok(TypeSig::GenericInst(Box::new(base_type), type_args))
            }
            ELEMENT_TYPE::TYPEDBYREF => Ok(TypeSig::TypedByRef),
            ELEMENT_TYPE::I => Ok(TypeSig::I),
            ELEMENT_TYPE::U => Ok(TypeSig::U),
            ELEMENT_TYPE::FNPTR => Ok(TypeSig::FnPtr(Box::new(self.read_method_sig()?))),
            ELEMENT_TYPE::OBJECT => Ok(TypeSig::Object),
            ELEMENT_TYPE::SZARRAY => Ok(TypeSig::SzArray(SigSzArray {
                modifiers: self.read_custom_mods()?,
                base: Box::new(self.read_type()?),
            })),
            ELEMENT_TYPE::MVAR => Ok(TypeSig::GenericVarMethod(
                self.parser.read_compressed_uint()?,
            )),
            ELEMENT_TYPE::PINNED => Ok(TypeSig::Pinned(Box::new(self.read_type()?))),
            ELEMENT_TYPE::SENTINEL => Ok(TypeSig::Sentinel),
            _ => Err(malformed_error!(
                "Unsupported ELEMENT_TYPE - 0x{:02X}",
                current_byte
            )),
        };

        self.depth -= 1;
        result
    }

    /// Parse leading custom modifiers (`CMOD_REQD` / `CMOD_OPT`)
    fn read_custom_mods(&mut self) -> Result<Vec<SigModifier>> {
        let mut mods = Vec::new();

        while self.parser.has_more_data() {
            let next_byte = self.parser.peek_byte()?;
            if next_byte != ELEMENT_TYPE::CMOD_REQD && next_byte != ELEMENT_TYPE::CMOD_OPT {
                break;
            }

            self.parser.advance()?;
            mods.push(SigModifier {
                required: next_byte == ELEMENT_TYPE::CMOD_REQD,
                modifier_type: self.parser.read_compressed_token()?,
            });
        }

        Ok(mods)
    }

    /// Parse a parameter or return type
    fn read_param(&mut self) -> Result<SigParam> {
        let modifiers = self.read_custom_mods()?;

        let mut by_ref = false;
        if self.parser.peek_byte()? == ELEMENT_TYPE::BYREF {
            self.parser.advance()?;
            by_ref = true;
        }

        Ok(SigParam {
            modifiers,
            by_ref,
            base: self.read_type()?,
        })
    }

    /// Parse a method signature - MethodDefSig, MethodRefSig or
    /// StandAloneMethodSig.
    ///
    /// # Errors
    /// Returns an error when the blob violates the signature grammar or
    /// nesting exceeds the recursion limit
    pub fn read_method_sig(&mut self) -> Result<MethodSig> {
        let convention = self.parser.read_le::<u8>()?;

        let generic_param_count = if convention & SIGNATURE::GENERIC != 0 {
            self.parser.read_compressed_uint()?
        } else {
            0
        };

        let param_count = self.parser.read_compressed_uint()?;
        let mut method = MethodSig {
            has_this: convention & SIGNATURE::HASTHIS != 0,
            explicit_this: convention & SIGNATURE::EXPLICITTHIS != 0,
            call_conv: convention & SIGNATURE::CALLCONV_MASK,
            generic_param_count,
            return_type: self.read_param()?,
            params: Vec::new(),
            varargs: Vec::new(),
        };

        let mut past_sentinel = false;
        for _ in 0..param_count {
            if !past_sentinel && self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                self.parser.advance()?;
                past_sentinel = true;
            }

            let param = self.read_param()?;
            if past_sentinel {
                method.varargs.push(param);
            } else {
                method.params.push(param);
            }
        }

        Ok(method)
    }

    /// Parse a field signature (II.23.2.4).
    ///
    /// # Errors
    /// Returns an error when the prolog byte is not `FIELD` or the type
    /// cannot be parsed
    pub fn read_field_sig(&mut self) -> Result<FieldSig> {
        let head = self.parser.read_le::<u8>()?;
        if head != SIGNATURE::FIELD {
            return Err(malformed_error!("FieldSig has invalid prolog - {}", head));
        }

        Ok(FieldSig {
            modifiers: self.read_custom_mods()?,
            base: self.read_type()?,
        })
    }

    /// Parse a property signature (II.23.2.5).
    ///
    /// # Errors
    /// Returns an error when the prolog lacks the `PROPERTY` bit or any
    /// parameter cannot be parsed
    pub fn read_property_sig(&mut self) -> Result<PropertySig> {
        let head = self.parser.read_le::<u8>()?;
        if head & SIGNATURE::PROPERTY == 0 {
            return Err(malformed_error!("PropertySig has invalid prolog - {}", head));
        }

        let param_count = self.parser.read_compressed_uint()?;
        let modifiers = self.read_custom_mods()?;
        let base = self.read_type()?;

        let mut params = Vec::with_capacity(param_count as usize);
        for _ in 0..param_count {
            params.push(self.read_param()?);
        }

        Ok(PropertySig {
            has_this: head & SIGNATURE::HASTHIS != 0,
            modifiers,
            base,
            params,
        })
    }

    /// Parse a local variable signature (II.23.2.6).
    ///
    /// # Errors
    /// Returns an error when the prolog byte is not `LOCAL_SIG` or any
    /// variable cannot be parsed
    pub fn read_local_var_sig(&mut self) -> Result<LocalVarSig> {
        let head = self.parser.read_le::<u8>()?;
        if head != SIGNATURE::LOCAL_SIG {
            return Err(malformed_error!("LocalVarSig has invalid prolog - {}", head));
        }

        let count = self.parser.read_compressed_uint()?;
        let mut locals = Vec::with_capacity(count as usize);

        for _ in 0..count {
            if self.parser.peek_byte()? == ELEMENT_TYPE::TYPEDBYREF {
                self.parser.advance()?;
                locals.push(LocalVar {
                    modifiers: Vec::new(),
                    by_ref: false,
                    pinned: false,
                    base: TypeSig::TypedByRef,
                });
                continue;
            }

            // Constraint (PINNED) and custom modifiers may interleave
            let mut modifiers = Vec::new();
            let mut pinned = false;
            while self.parser.has_more_data() {
                match self.parser.peek_byte()? {
                    ELEMENT_TYPE::CMOD_REQD | ELEMENT_TYPE::CMOD_OPT => {
                        let required = self.parser.peek_byte()? == ELEMENT_TYPE::CMOD_REQD;
                        self.parser.advance()?;
                        modifiers.push(SigModifier {
                            required,
                            modifier_type: self.parser.read_compressed_token()?,
                        });
                    }
                    ELEMENT_TYPE::PINNED => {
                        self.parser.advance()?;
                        pinned = true;
                    }
                    _ => break,
                }
            }

            let mut by_ref = false;
            if self.parser.peek_byte()? == ELEMENT_TYPE::BYREF {
                self.parser.advance()?;
                by_ref = true;
            }

            locals.push(LocalVar {
                modifiers,
                by_ref,
                pinned,
                base: self.read_type()?,
            });
        }

        Ok(LocalVarSig { locals })
    }

    /// Parse a type specification signature (II.23.2.14).
    ///
    /// # Errors
    /// Returns an error when the type cannot be parsed
    pub fn read_type_spec_sig(&mut self) -> Result<TypeSpecSig> {
        Ok(TypeSpecSig {
            base: self.read_type()?,
        })
    }

    /// Parse a method specification signature (II.23.2.15).
    ///
    /// # Errors
    /// Returns an error when the prolog byte is not `GENERICINST` or any
    /// argument cannot be parsed
    pub fn read_method_spec_sig(&mut self) -> Result<MethodSpecSig> {
        let head = self.parser.read_le::<u8>()?;
        if head != SIGNATURE::GENERICINST {
            return Err(malformed_error!(
                "MethodSpecSig has invalid prolog - {}",
                head
            ));
        }

        let count = self.parser.read_compressed_uint()?;
        let mut generic_args = Vec::with_capacity(count as usize);
        for _ in 0..count {
            generic_args.push(self.read_type()?);
        }

        Ok(MethodSpecSig { generic_args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::Token;

    #[test]
    fn method_sig_static_void_string() {
        // default callconv, 1 param, void return, string param:
        // static void M(string)
        let data = [0x00, 0x01, 0x01, 0x0E];
        let sig = SignatureReader::new(&data).read_method_sig().unwrap();

        assert!(!sig.has_this);
        assert_eq!(sig.call_conv, SIGNATURE::CALLCONV_DEFAULT);
        assert_eq!(sig.return_type.base, TypeSig::Void);
        assert_eq!(sig.params.len(), 1);
        assert_eq!(sig.params[0].base, TypeSig::String);
    }

    #[test]
    fn method_sig_instance_generic() {
        // HASTHIS | GENERIC, 1 generic param, 1 param of type MVAR 0,
        // returns VAR 0
        let data = [0x30, 0x01, 0x01, 0x13, 0x00, 0x1E, 0x00];
        let sig = SignatureReader::new(&data).read_method_sig().unwrap();

        assert!(sig.has_this);
        assert_eq!(sig.generic_param_count, 1);
        assert_eq!(sig.return_type.base, TypeSig::GenericVarType(0));
        assert_eq!(sig.params[0].base, TypeSig::GenericVarMethod(0));
    }

    #[test]
    fn field_sig_with_class() {
        // FIELD, CLASS, TypeRef row 2
        let data = [0x06, 0x12, 0x09];
        let sig = SignatureReader::new(&data).read_field_sig().unwrap();
        assert_eq!(sig.base, TypeSig::Class(Token::new(0x0100_0002)));
    }

    #[test]
    fn local_var_sig_pinned() {
        // LOCAL_SIG, 2 locals: pinned object, int32
        let data = [0x07, 0x02, 0x45, 0x1C, 0x08];
        let sig = SignatureReader::new(&data).read_local_var_sig().unwrap();

        assert_eq!(sig.locals.len(), 2);
        assert!(sig.locals[0].pinned);
        assert_eq!(sig.locals[0].base, TypeSig::Object);
        assert!(!sig.locals[1].pinned);
        assert_eq!(sig.locals[1].base, TypeSig::I4);
    }

    #[test]
    fn type_spec_generic_inst() {
        // GENERICINST CLASS TypeDef(1) <I4>
        let data = [0x15, 0x12, 0x04, 0x01, 0x08];
        let sig = SignatureReader::new(&data).read_type_spec_sig().unwrap();

        match sig.base {
            TypeSig::GenericInst(base, args) => {
                assert_eq!(*base, TypeSig::Class(Token::new(0x0200_0001)));
                assert_eq!(args, vec![TypeSig::I4]);
            }
            other => panic!("expected GenericInst, got {other:?}"),
        }
    }

    #[test]
    fn array_with_bounds() {
        // ARRAY I4 rank=2 sizes=[2: 3 4] lobounds=[0]
        let data = [0x14, 0x08, 0x02, 0x02, 0x03, 0x04, 0x00];
        let mut reader = SignatureReader::new(&data);
        match reader.read_type_spec_sig().unwrap().base {
            TypeSig::Array(array) => {
                assert_eq!(*array.base, TypeSig::I4);
                assert_eq!(array.rank, 2);
                assert_eq!(array.dimensions.len(), 2);
                assert_eq!(array.dimensions[0].size, Some(3));
                assert_eq!(array.dimensions[1].size, Some(4));
            }
            other => panic!("expected Array, got {other:?}"),
        }
    }

    #[test]
    fn vararg_call_site() {
        // VARARG, 2 params: i4, SENTINEL, string
        let data = [0x05, 0x02, 0x01, 0x08, 0x41, 0x0E];
        let sig = SignatureReader::new(&data).read_method_sig().unwrap();

        assert!(sig.is_vararg());
        assert_eq!(sig.params.len(), 1);
        assert_eq!(sig.params[0].base, TypeSig::I4);
        assert_eq!(sig.varargs.len(), 1);
        assert_eq!(sig.varargs[0].base, TypeSig::String);
    }

    #[test]
    fn recursion_guard() {
        // 60 nested SZARRAY markers overflow the depth limit
        let mut data = vec![0x06]; // FIELD
        data.extend(std::iter::repeat(0x1D).take(60));
        data.push(0x08);
        assert!(matches!(
            SignatureReader::new(&data).read_field_sig(),
            Err(RecursionLimit(_))
        ));
    }
}
