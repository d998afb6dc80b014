use thiserror::Error;

use crate::program::refs::TypeRef;

macro_rules! schema_error {
    // Single format string version
    ($msg:expr) => {
        crate::Error::MalformedSchema {
            message: format!($msg),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::MalformedSchema {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The taxonomy mirrors how failures propagate through the shrinker: schema decode problems are
/// contained to the message being processed, unsoundness is fatal for the whole compilation, and
/// I/O problems reading explicitly requested inputs are rethrown to the caller.
///
/// # Error Categories
///
/// ## Recoverable, contained per message
/// - [`Error::MalformedSchema`] - The schema payload or its object array did not have the
///   expected shape. Callers skip rewriting that message and leave it unoptimized.
///
/// ## Fatal for the compilation
/// - [`Error::UnsoundOptimization`] - A type this core claimed dead is still present in the
///   final output. Indicates an unsound optimization and must never be ignored.
/// - [`Error::FileError`] - Reading the user-supplied diagnostic allow-list failed. The file
///   was explicitly requested, so the failure is rethrown rather than swallowed.
///
/// # Examples
///
/// ```rust
/// use protoshrink::Error;
///
/// fn report(err: &Error) {
///     match err {
///         Error::MalformedSchema { message, file, line } => {
///             eprintln!("skipping message: {} ({}:{})", message, file, line);
///         }
///         Error::UnsoundOptimization(ty) => {
///             eprintln!("compilation is unsound: {}", ty);
///         }
///         e => eprintln!("error: {}", e),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The schema payload is damaged or does not match the generated-code shape.
    ///
    /// This covers every decode failure: an info operand that does not resolve to a constant
    /// string, an objects operand that is not a fresh fully-initialized array, truncated or
    /// trailing integers in the packed stream, and object counts that disagree with the
    /// decoded field types. The error includes the source location where the malformation
    /// was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file in which the error was detected
    /// * `line` - Source line in which the error was detected
    #[error("Malformed schema - {file}:{line}: {message}")]
    MalformedSchema {
        /// The message to be printed for the malformed-schema error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A dead-type candidate is still referenced in the final output.
    ///
    /// The shrinker recorded this type as provably unreachable, but the post-optimization
    /// verification found it live. This is a hard compilation failure: silently keeping the
    /// type would mask an unsound rewrite.
    #[error("Dead type candidate is still live after optimization - {0}")]
    UnsoundOptimization(TypeRef),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors from reading the diagnostic allow-list file. The read is
    /// the only I/O this crate performs, and it happens once before the parallel phase.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    ///
    /// Used for errors that don't fit into other categories or for wrapping collaborator
    /// failures with additional context.
    #[error("{0}")]
    Error(String),
}
