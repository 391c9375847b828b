use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type covering every failure this library can report.
///
/// Loading is transactional per image and building is transactional per
/// emission: when any operation returns an error, the partially built or
/// partially loaded state must be discarded by the caller.
///
/// # Error Categories
///
/// ## Image parsing
/// - [`Error::Malformed`] - Corrupted or inconsistent file structure
/// - [`Error::OutOfBounds`] - Read beyond the end of a buffer or stream
/// - [`Error::NotSupported`] - Not a CLI image, or an unsupported layout
/// - [`Error::Empty`] - Empty input provided
///
/// ## Reference resolution
/// - [`Error::RowNotFound`] - A token or coded index points at a row that
///   does not exist in the target table
///
/// ## Method bodies
/// - [`Error::InvalidOpcode`] - Unknown opcode byte sequence
/// - [`Error::UnresolvedLabel`] - A branch label was never bound to an offset
///
/// ## Build pipeline
/// - [`Error::ContractViolation`] - Phase ordering was violated, e.g. a
///   mutation after the model was finalised
///
/// # Examples
///
/// ```rust,no_run
/// use cilforge::{CilImage, Error};
///
/// match CilImage::from_file("library.dll".as_ref()) {
///     Ok(image) => println!("{} tables present", image.tables().present_count()),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("malformed image: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("load failed: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The image is damaged or internally inconsistent and could not be parsed.
    ///
    /// Carries the source location at which the malformation was detected,
    /// which is the fastest way to find the offending structure when
    /// debugging a broken producer.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported (not a PE image with CLI metadata).
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// A token or coded index referenced a row that does not exist.
    ///
    /// The associated [`Token`] identifies the dangling reference.
    #[error("Referenced row does not exist - {0}")]
    RowNotFound(Token),

    /// An unknown opcode was encountered while decoding a method body.
    ///
    /// Two-byte opcodes carry the `0xFE` prefix in the high byte.
    #[error("Unknown CIL opcode - 0x{0:04X}")]
    InvalidOpcode(u16),

    /// A branch label was used but never bound to an instruction offset.
    ///
    /// The associated value is the label id handed out by the body builder.
    #[error("Label {0} was never bound to an offset")]
    UnresolvedLabel(u32),

    /// A phase-ordering contract of the build or load pipeline was violated.
    #[error("Contract violation: {0}")]
    ContractViolation(&'static str),

    /// Recursion limit reached while parsing nested signatures.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),
}
