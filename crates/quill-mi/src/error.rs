//! MI parse errors.

use thiserror::Error;

/// Errors produced while decoding MI output or encoding commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiError {
    /// The record text did not follow the MI grammar.
    #[error("malformed MI record at byte {offset}: {message}")]
    Syntax {
        /// Byte offset into the line where parsing failed.
        offset: usize,
        /// What the parser expected.
        message: String,
    },

    /// A result record carried a class gdb does not define.
    #[error("unknown result class: {0}")]
    UnknownResultClass(String),

    /// A command contained a line break and would desynchronise the stream.
    #[error("command must be a single line: {0:?}")]
    MultiLineCommand(String),
}
