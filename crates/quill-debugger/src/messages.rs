//! User-facing texts carried by failure notifications.

use std::time::Duration;

pub const MSG_INFERIOR_STARTED: &str = "Inferior started.";

pub fn side_channel_failed(reason: &str) -> String {
    format!("Cannot set up communication with child process: {reason}")
}

pub fn executable_failed(reason: &str) -> String {
    format!("Starting executable failed:\n{reason}")
}

/// gdb reads one command per line, so a line break cannot be passed on.
pub fn unsendable_argument(index: usize) -> String {
    executable_failed(&format!(
        "program argument {index} contains a line break, which gdb cannot pass"
    ))
}

pub fn remote_connect_failed(reason: &str) -> String {
    format!("Connecting to remote server failed:\n{reason}")
}

pub fn inferior_stop_failed(reason: &str) -> String {
    format!("Inferior process could not be stopped:\n{reason}")
}

pub fn gdb_stop_failed(reason: &str) -> String {
    format!("The gdb process could not be stopped:\n{reason}")
}

pub fn gdb_failed_to_start(program: &str, reason: &str) -> String {
    format!(
        "The gdb process failed to start. Either the invoked program '{program}' is missing, \
         or you may have insufficient permissions to invoke the program.\n{reason}"
    )
}

/// Reason for an exit that nobody asked for.
pub fn gdb_exited(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("The gdb process exited unexpectedly (code {code})."),
        None => "The gdb process crashed some time after starting successfully.".to_string(),
    }
}

pub fn command_timed_out(command: &str, waited: Duration) -> String {
    format!("gdb not responding to '{command}' after {}s", waited.as_secs())
}
