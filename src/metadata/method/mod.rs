//! Method body headers and exception handling data.
//!
//! [`MethodBody`] decodes the tiny and fat header formats of ECMA-335
//! II.25.4 together with their exception handling sections. The IL byte
//! stream inside a body is decoded separately by [`crate::assembly`].

mod body;
mod exceptions;

pub use body::MethodBody;
pub use exceptions::{
    ExceptionHandler, ExceptionHandlerFlags, MethodBodyFlags, SectionFlags,
};
