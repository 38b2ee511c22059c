//! quill-mi: GDB machine-interface wire format.
//!
//! Parses the line-oriented output of `gdb -i mi` into typed records and
//! builds the command lines the adapter writes back. No I/O happens here.

pub mod command;
pub mod error;
pub mod record;
pub mod value;

pub use command::encode_command;
pub use error::MiError;
pub use record::{
    is_result_line, parse_record, AsyncClass, MiRecord, MiResponse, ResultClass, StreamKind,
};
pub use value::MiValue;
