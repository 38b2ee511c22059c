//! Owning the gdb process.
//!
//! A [`Supervisor`] spawns the debugger, writes command lines to its stdin
//! and reports everything else (output lines, debuggee bytes, failures,
//! exit) as [`ProcessEvent`]s on an unbounded channel that the adapter's
//! runner drains. [`GdbSupervisor`] is the tokio implementation;
//! [`MockSupervisor`](crate::mock::MockSupervisor) records calls for tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::error::SupervisorError;
use crate::side_channel::OutputCollector;

/// How long the exit watcher waits for stdout to drain before reporting the exit.
const STDOUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Something the debugger process did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// The process is up. Always precedes its output.
    Started { pid: Option<u32> },
    /// One line of gdb's stdout, without the line terminator.
    Stdout(String),
    Stderr(String),
    /// Bytes the inferior wrote to its terminal.
    DebuggeeOutput(Vec<u8>),
    /// A pipe to the process broke after a successful start.
    Error(ProcessFailure),
    /// The process is gone; `None` when it was killed by a signal.
    Exited { code: Option<i32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessFailure {
    ReadError(String),
    WriteError(String),
}

impl ProcessFailure {
    pub fn message(&self) -> String {
        match self {
            ProcessFailure::ReadError(detail) => format!(
                "An error occurred when attempting to read from the gdb process. \
                 For example, the process may not be running.\n{detail}"
            ),
            ProcessFailure::WriteError(detail) => format!(
                "An error occurred when attempting to write to the gdb process. \
                 For example, the process may not be running, or it may have closed \
                 its input channel.\n{detail}"
            ),
        }
    }
}

/// Adapter-chosen part of the command line and environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessLaunch {
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub environment: BTreeMap<String, String>,
}

/// Fixed at construction: which gdb to run and where FIFOs go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub gdb_path: String,
    /// Prepended to the adapter's own arguments.
    pub extra_args: Vec<String>,
    /// Parent directory for the debuggee FIFO; the system temp dir if unset.
    pub tty_dir: Option<PathBuf>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            gdb_path: "gdb".to_string(),
            extra_args: Vec::new(),
            tty_dir: None,
        }
    }
}

/// The process-facing side of a debugger adapter.
pub trait Supervisor: Send + 'static {
    /// Create the debuggee's terminal and return the path gdb should use.
    fn open_side_channel(&mut self) -> Result<PathBuf, SupervisorError>;

    /// Stop forwarding debuggee output and remove the terminal. Idempotent.
    fn close_side_channel(&mut self);

    /// Start the debugger. A [`ProcessEvent::Started`] follows on success.
    fn spawn(&mut self, launch: ProcessLaunch) -> Result<(), SupervisorError>;

    /// Queue one framed command line for gdb's stdin.
    fn write(&mut self, bytes: Vec<u8>) -> Result<(), SupervisorError>;

    /// Deliver an interrupt to the inferior process `pid`.
    fn interrupt(&mut self, pid: u32) -> Result<(), SupervisorError>;

    /// Kill the debugger. A [`ProcessEvent::Exited`] follows.
    fn terminate(&mut self);

    fn is_running(&self) -> bool;
}

/// Runs gdb under tokio. Must be driven from inside a runtime.
pub struct GdbSupervisor {
    config: SupervisorConfig,
    events: mpsc::UnboundedSender<ProcessEvent>,
    collector: Option<OutputCollector>,
    writer_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    kill_tx: Option<oneshot::Sender<()>>,
    running: Arc<AtomicBool>,
}

impl GdbSupervisor {
    pub fn new(config: SupervisorConfig, events: mpsc::UnboundedSender<ProcessEvent>) -> Self {
        Self {
            config,
            events,
            collector: None,
            writer_tx: None,
            kill_tx: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    fn spawn_error(&self, detail: &str) -> SupervisorError {
        SupervisorError::Spawn {
            program: self.config.gdb_path.clone(),
            source: std::io::Error::other(detail.to_string()),
        }
    }
}

impl Supervisor for GdbSupervisor {
    fn open_side_channel(&mut self) -> Result<PathBuf, SupervisorError> {
        self.close_side_channel();
        let collector =
            OutputCollector::listen(self.config.tty_dir.as_deref(), self.events.clone())?;
        let path = collector.path().to_path_buf();
        debug!(path = %path.display(), "side channel listening");
        self.collector = Some(collector);
        Ok(path)
    }

    fn close_side_channel(&mut self) {
        if self.collector.take().is_some() {
            debug!("side channel closed");
        }
    }

    fn spawn(&mut self, launch: ProcessLaunch) -> Result<(), SupervisorError> {
        let mut cmd = Command::new(&self.config.gdb_path);
        cmd.args(&self.config.extra_args)
            .args(&launch.args)
            .envs(&launch.environment)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &launch.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            program: self.config.gdb_path.clone(),
            source,
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.spawn_error("could not capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.spawn_error("could not capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| self.spawn_error("could not capture stderr"))?;

        let pid = child.id();
        info!(program = %self.config.gdb_path, ?pid, args = ?launch.args, "gdb spawned");
        self.running.store(true, Ordering::SeqCst);
        let _ = self.events.send(ProcessEvent::Started { pid });

        // Writer task
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(line) = writer_rx.recv().await {
                let result = match stdin.write_all(&line).await {
                    Ok(()) => stdin.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    let _ = events.send(ProcessEvent::Error(ProcessFailure::WriteError(
                        e.to_string(),
                    )));
                    break;
                }
            }
        });

        let stdout_task = tokio::spawn(forward_lines(
            stdout,
            self.events.clone(),
            ProcessEvent::Stdout,
        ));
        tokio::spawn(forward_lines(stderr, self.events.clone(), ProcessEvent::Stderr));

        // Exit watcher
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let events = self.events.clone();
        let running = self.running.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx => {
                    if let Err(e) = child.start_kill() {
                        warn!(error = %e, "kill failed");
                    }
                    child.wait().await
                }
            };
            // Report buffered replies (e.g. `^exit`) before the exit itself.
            if timeout(STDOUT_DRAIN_TIMEOUT, stdout_task).await.is_err() {
                debug!("stdout still open after exit");
            }
            running.store(false, Ordering::SeqCst);
            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(error = %e, "waiting for gdb failed");
                    None
                }
            };
            info!(?code, "gdb exited");
            let _ = events.send(ProcessEvent::Exited { code });
        });

        self.writer_tx = Some(writer_tx);
        self.kill_tx = Some(kill_tx);
        Ok(())
    }

    fn write(&mut self, bytes: Vec<u8>) -> Result<(), SupervisorError> {
        let tx = self.writer_tx.as_ref().ok_or(SupervisorError::NotRunning)?;
        tx.send(bytes).map_err(|_| SupervisorError::NotRunning)
    }

    fn interrupt(&mut self, pid: u32) -> Result<(), SupervisorError> {
        quill_platform::interrupt_process(pid)?;
        Ok(())
    }

    fn terminate(&mut self) {
        if let Some(kill) = self.kill_tx.take() {
            let _ = kill.send(());
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Forward each line of `stream` as an event until EOF.
async fn forward_lines<R>(
    stream: R,
    events: mpsc::UnboundedSender<ProcessEvent>,
    wrap: fn(String) -> ProcessEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => return,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                if events.send(wrap(line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = events.send(ProcessEvent::Error(ProcessFailure::ReadError(e.to_string())));
                return;
            }
        }
    }
}
