use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::SupervisorError;
use crate::supervisor::{ProcessLaunch, Supervisor};

/// Path reported by [`MockSupervisor::open_side_channel`].
pub const MOCK_TTY: &str = "/tmp/quill-mock/tty";

#[derive(Debug, Default)]
struct MockLog {
    writes: Vec<Vec<u8>>,
    launches: Vec<ProcessLaunch>,
    interrupts: Vec<u32>,
    terminations: usize,
    side_channel_open: bool,
    running: bool,
    fail_side_channel: Option<String>,
    fail_spawn: Option<String>,
    fail_writes: bool,
    fail_interrupts: bool,
}

/// A supervisor that records every call instead of running a process.
///
/// Clones share one log, so a test can keep a handle after moving the
/// supervisor into an adapter. Process events are fed by the test itself.
#[derive(Debug, Clone, Default)]
pub struct MockSupervisor {
    log: Arc<Mutex<MockLog>>,
}

impl MockSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, MockLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next `open_side_channel` fail with `reason`.
    pub fn fail_side_channel(&self, reason: &str) {
        self.log().fail_side_channel = Some(reason.to_string());
    }

    /// Make `spawn` fail with `reason`.
    pub fn fail_spawn(&self, reason: &str) {
        self.log().fail_spawn = Some(reason.to_string());
    }

    pub fn fail_writes(&self) {
        self.log().fail_writes = true;
    }

    pub fn fail_interrupts(&self) {
        self.log().fail_interrupts = true;
    }

    /// Commands written so far, without their line terminators.
    pub fn commands(&self) -> Vec<String> {
        self.log()
            .writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).trim_end_matches('\n').to_string())
            .collect()
    }

    pub fn launches(&self) -> Vec<ProcessLaunch> {
        self.log().launches.clone()
    }

    pub fn interrupts(&self) -> Vec<u32> {
        self.log().interrupts.clone()
    }

    pub fn terminations(&self) -> usize {
        self.log().terminations
    }

    pub fn side_channel_open(&self) -> bool {
        self.log().side_channel_open
    }
}

impl Supervisor for MockSupervisor {
    fn open_side_channel(&mut self) -> Result<PathBuf, SupervisorError> {
        let mut log = self.log();
        if let Some(reason) = log.fail_side_channel.take() {
            return Err(SupervisorError::SideChannel(reason));
        }
        log.side_channel_open = true;
        Ok(PathBuf::from(MOCK_TTY))
    }

    fn close_side_channel(&mut self) {
        self.log().side_channel_open = false;
    }

    fn spawn(&mut self, launch: ProcessLaunch) -> Result<(), SupervisorError> {
        let mut log = self.log();
        if let Some(reason) = log.fail_spawn.take() {
            return Err(SupervisorError::Spawn {
                program: "gdb".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, reason),
            });
        }
        log.launches.push(launch);
        log.running = true;
        Ok(())
    }

    fn write(&mut self, bytes: Vec<u8>) -> Result<(), SupervisorError> {
        let mut log = self.log();
        if log.fail_writes {
            return Err(SupervisorError::NotRunning);
        }
        log.writes.push(bytes);
        Ok(())
    }

    fn interrupt(&mut self, pid: u32) -> Result<(), SupervisorError> {
        let mut log = self.log();
        if log.fail_interrupts {
            return Err(SupervisorError::Interrupt(
                quill_platform::PlatformError::Signal {
                    pid,
                    reason: "No such process".into(),
                },
            ));
        }
        log.interrupts.push(pid);
        Ok(())
    }

    fn terminate(&mut self) {
        let mut log = self.log();
        log.terminations += 1;
        log.running = false;
    }

    fn is_running(&self) -> bool {
        self.log().running
    }
}
