//! Building MI command lines.

use std::path::Path;

use crate::error::MiError;

pub const EXEC_RUN: &str = "-exec-run";
pub const EXEC_CONTINUE: &str = "-exec-continue";
pub const EXEC_INTERRUPT: &str = "-exec-interrupt";
pub const KILL: &str = "kill";
pub const GDB_EXIT: &str = "-gdb-exit";

/// Quote `s` as an MI C-string.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Quote an inferior argument only when the shell would split or
/// reinterpret it.
fn shell_word(arg: &str) -> String {
    if !arg.is_empty()
        && !arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\'))
    {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('\'');
    for c in arg.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// `-exec-arguments a b c`.
pub fn exec_arguments(args: &[String]) -> String {
    let mut cmd = String::from("-exec-arguments");
    for arg in args {
        cmd.push(' ');
        cmd.push_str(&shell_word(arg));
    }
    cmd
}

/// `-file-exec-and-symbols "<path>"`.
pub fn file_exec_and_symbols(path: &Path) -> String {
    format!(
        "-file-exec-and-symbols {}",
        quote(&path.to_string_lossy())
    )
}

/// `-target-select remote <target>`, e.g. `localhost:3333`.
pub fn target_select_remote(target: &str) -> String {
    format!("-target-select remote {target}")
}

/// Frame a command for gdb's stdin.
///
/// # Errors
///
/// [`MiError::MultiLineCommand`] if `command` contains a line break, which
/// would be read as two commands and break FIFO correlation.
pub fn encode_command(command: &str) -> Result<Vec<u8>, MiError> {
    if command.contains(['\n', '\r']) {
        return Err(MiError::MultiLineCommand(command.to_string()));
    }
    let mut buf = Vec::with_capacity(command.len() + 1);
    buf.extend_from_slice(command.as_bytes());
    buf.push(b'\n');
    Ok(buf)
}
