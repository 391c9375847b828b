//! Signature blob codec for ECMA-335 II.23.2.
//!
//! Signatures are tagged byte strings stored in the `#Blob` heap, describing
//! the types of fields, methods, properties, local variables, constructed
//! types and generic instantiations. [`SignatureReader`] decodes them into
//! the structured types of this module; the `encode_*` functions produce the
//! byte form back, bit-exact.
//!
//! # Example
//!
//! ```rust
//! use cilforge::metadata::signatures::{encode_field_sig, FieldSig, SignatureReader, TypeSig};
//!
//! let sig = FieldSig { modifiers: Vec::new(), base: TypeSig::I4 };
//! let blob = encode_field_sig(&sig)?;
//! assert_eq!(blob, vec![0x06, 0x08]);
//!
//! let reread = SignatureReader::new(&blob).read_field_sig()?;
//! assert_eq!(reread, sig);
//! # Ok::<(), cilforge::Error>(())
//! ```

mod encoder;
mod parser;
mod types;

pub use encoder::{
    encode_field_sig, encode_local_var_sig, encode_method_sig, encode_method_spec_sig,
    encode_property_sig, encode_type, encode_type_spec_sig, encode_type_token,
};
pub use parser::SignatureReader;
pub use types::{
    FieldSig, LocalVar, LocalVarSig, MethodSig, MethodSpecSig, PropertySig, SigArray, SigModifier,
    SigParam, SigPointer, SigSzArray, TypeSig, TypeSpecSig,
};
