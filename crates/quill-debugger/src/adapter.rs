//! The gdb adapter state machine.
//!
//! [`GdbAdapter`] turns engine requests into MI commands, routes gdb's
//! replies to the continuation registered with each command and reports
//! progress as [`AdapterNotification`]s. Calling an operation in a state
//! that does not allow it is a programming error in the engine and panics.

use std::time::{Duration, Instant};

use quill_mi::command::{
    exec_arguments, file_exec_and_symbols, target_select_remote, EXEC_CONTINUE, EXEC_INTERRUPT,
    EXEC_RUN, GDB_EXIT, KILL,
};
use quill_mi::{
    is_result_line, parse_record, AsyncClass, MiRecord, MiResponse, MiValue, ResultClass,
    StreamKind,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::channel::{CommandChannel, CommandKind, Dispatch, MiCommand};
use crate::error::SupervisorError;
use crate::messages;
use crate::notification::AdapterNotification;
use crate::params::{AdapterKind, StartParameters};
use crate::state::AdapterState;
use crate::supervisor::{ProcessEvent, ProcessFailure, ProcessLaunch, Supervisor};

/// Lifecycle operations an engine drives an adapter through.
pub trait DebuggerAdapter: Send {
    fn state(&self) -> AdapterState;

    /// Spawn the debugger. Completion is reported as `AdapterStarted` or
    /// `AdapterStartFailed`.
    fn start_adapter(&mut self);

    /// Load the executable (and connect to the target, for remote kinds).
    fn prepare_inferior(&mut self);

    /// Acknowledge `InferiorPrepared`; the engine may set breakpoints now.
    fn mark_inferior_starting(&mut self);

    /// Run or resume the inferior.
    fn start_inferior(&mut self);

    /// Ask the running inferior to stop. Best effort.
    fn interrupt_inferior(&mut self);

    /// Orderly teardown: kill the inferior if live, then exit gdb.
    fn shutdown(&mut self);

    /// Forced teardown: kill gdb without asking.
    fn terminate(&mut self);

    fn handle_process_event(&mut self, event: ProcessEvent);

    /// Declare gdb hung if the oldest command is overdue.
    fn check_timeouts(&mut self, now: Instant);
}

macro_rules! require_state {
    ($self:ident, $op:expr, $($state:ident)|+) => {
        if !matches!($self.state, $(AdapterState::$state)|+) {
            contract_violation($op, $self.state);
        }
    };
}

#[cold]
#[track_caller]
fn contract_violation(operation: &str, state: AdapterState) -> ! {
    error!(operation, %state, "operation not allowed in this state");
    panic!("{operation} called in state {state}");
}

/// Drives one gdb process through the adapter lifecycle.
pub struct GdbAdapter<S: Supervisor> {
    kind: AdapterKind,
    params: StartParameters,
    supervisor: S,
    channel: CommandChannel<GdbAdapter<S>>,
    state: AdapterState,
    inferior_pid: Option<u32>,
    command_timeout: Option<Duration>,
    notifier: mpsc::UnboundedSender<AdapterNotification>,
    terminating: bool,
}

impl<S: Supervisor> GdbAdapter<S> {
    pub fn new(
        kind: AdapterKind,
        params: StartParameters,
        supervisor: S,
        notifier: mpsc::UnboundedSender<AdapterNotification>,
    ) -> Self {
        Self {
            kind,
            params,
            supervisor,
            channel: CommandChannel::new(),
            state: AdapterState::Starting,
            inferior_pid: None,
            command_timeout: None,
            notifier,
            terminating: false,
        }
    }

    /// Declare gdb hung when a command stays unanswered longer than `limit`.
    /// `None` waits forever.
    pub fn with_command_timeout(mut self, limit: Option<Duration>) -> Self {
        self.command_timeout = limit;
        self
    }

    pub fn kind(&self) -> &AdapterKind {
        &self.kind
    }

    pub fn params(&self) -> &StartParameters {
        &self.params
    }

    /// PID of the inferior, once gdb has reported it.
    pub fn inferior_pid(&self) -> Option<u32> {
        self.inferior_pid
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    pub fn pending_commands(&self) -> usize {
        self.channel.pending_count()
    }

    fn emit(&self, notification: AdapterNotification) {
        if self.notifier.send(notification).is_err() {
            trace!("notification receiver dropped");
        }
    }

    fn set_state(&mut self, to: AdapterState) {
        let from = self.state;
        if from == to {
            return;
        }
        debug!(%from, %to, "state change");
        self.state = to;
        self.emit(AdapterNotification::StateChanged { from, to });
    }

    /// Send `command`. A command that cannot reach gdb leaves the session
    /// unusable, so the adapter is terminated and `false` returned.
    fn post(&mut self, command: MiCommand<Self>) -> bool {
        let text = command.text.clone();
        match self.channel.send(command, &mut self.supervisor) {
            Ok(()) => true,
            Err(e) => {
                error!(command = %text, error = %e, "cannot send command");
                self.emit(AdapterNotification::AdapterCrashed(format!(
                    "Cannot send '{text}' to gdb: {e}"
                )));
                self.terminate();
                false
            }
        }
    }

    // Process events

    fn handle_gdb_started(&mut self, pid: Option<u32>) {
        require_state!(self, "gdb started", Starting);
        info!(?pid, "gdb started");
        self.set_state(AdapterState::Started);
        self.emit(AdapterNotification::AdapterStarted);
    }

    fn handle_gdb_error(&mut self, failure: ProcessFailure) {
        let message = failure.message();
        error!(?failure, "gdb process error");
        self.emit(AdapterNotification::AdapterCrashed(message));
        self.terminate();
    }

    fn handle_gdb_finished(&mut self, code: Option<i32>) {
        if self.state == AdapterState::AdapterShutDown {
            debug!(?code, "exit after shutdown already reported");
            return;
        }
        info!(?code, state = %self.state, "gdb finished");
        self.supervisor.close_side_channel();
        let abandoned = self.channel.drain();
        if abandoned > 0 {
            debug!(abandoned, "pending commands dropped on exit");
        }
        if self.state != AdapterState::AdapterShuttingDown && !self.terminating {
            self.emit(AdapterNotification::AdapterCrashed(messages::gdb_exited(
                code,
            )));
        }
        self.inferior_pid = None;
        self.set_state(AdapterState::AdapterShutDown);
        self.emit(AdapterNotification::AdapterShutDown);
    }

    fn handle_output_line(&mut self, line: &str) {
        match parse_record(line) {
            Ok(record) => self.handle_record(record),
            // Still the answer to the oldest command; keep the queue aligned.
            Err(e) if is_result_line(line) => {
                warn!(error = %e, line, "malformed result record");
                self.handle_record(MiRecord::error_result(format!(
                    "unreadable reply from gdb: {e}"
                )));
            }
            Err(e) => warn!(error = %e, line, "unparseable gdb output"),
        }
    }

    fn handle_record(&mut self, record: MiRecord) {
        match self.channel.dispatch(record) {
            Dispatch::Reply { pending, response } => {
                debug!(command = %pending.text, %response, "reply");
                if pending.kind == CommandKind::RunRequest
                    && response.result_class == ResultClass::Running
                    && self.state == AdapterState::InferiorRunningRequested
                {
                    self.set_state(AdapterState::InferiorRunning);
                }
                match pending.callback {
                    Some(callback) => callback(self, &response),
                    None if response.result_class == ResultClass::Error => {
                        warn!(
                            command = %pending.text,
                            msg = response.error_message(),
                            "command failed"
                        );
                        self.emit(AdapterNotification::StatusMessage(format!(
                            "{} failed: {}",
                            pending.text,
                            response.error_message()
                        )));
                    }
                    None => {}
                }
            }
            Dispatch::Unsolicited(record) => self.handle_unsolicited(record),
        }
    }

    fn handle_unsolicited(&mut self, record: MiRecord) {
        match record {
            MiRecord::Async {
                kind: AsyncClass::Exec,
                class,
                results,
                ..
            } => self.handle_exec_async(&class, &results),
            MiRecord::Async {
                kind: AsyncClass::Notify,
                class,
                results,
                ..
            } => self.handle_notify_async(&class, &results),
            MiRecord::Async { class, .. } => trace!(%class, "status record"),
            MiRecord::Stream {
                kind: StreamKind::Console | StreamKind::Target,
                text,
            } => self.emit(AdapterNotification::ConsoleOutput(text)),
            MiRecord::Stream {
                kind: StreamKind::Log,
                text,
            } => debug!(text = text.trim_end(), "gdb log"),
            MiRecord::Result { class, .. } => debug!(?class, "unsolicited result ignored"),
            MiRecord::Prompt => {}
            MiRecord::Raw(line) => {
                self.emit(AdapterNotification::ConsoleOutput(format!("{line}\n")));
            }
        }
    }

    fn handle_exec_async(&mut self, class: &str, results: &MiValue) {
        match class {
            "running" => {
                if matches!(
                    self.state,
                    AdapterState::InferiorRunningRequested | AdapterState::InferiorStopped
                ) {
                    self.set_state(AdapterState::InferiorRunning);
                }
            }
            "stopped" => {
                let reason = results.child_data("reason").unwrap_or("").to_string();
                if reason.starts_with("exited") {
                    self.handle_inferior_exited(&reason, results);
                } else if matches!(
                    self.state,
                    AdapterState::InferiorRunningRequested
                        | AdapterState::InferiorRunning
                        | AdapterState::InferiorStopping
                ) {
                    info!(
                        %reason,
                        function = ?results.find_path("frame.func").map(MiValue::data),
                        details = %results.to_json(),
                        "inferior stopped"
                    );
                    self.set_state(AdapterState::InferiorStopped);
                    self.emit(AdapterNotification::InferiorStopped { reason });
                } else {
                    debug!(%reason, state = %self.state, "stop record ignored");
                }
            }
            other => trace!(class = other, "exec record"),
        }
    }

    fn handle_inferior_exited(&mut self, reason: &str, results: &MiValue) {
        // gdb prints exit codes in octal.
        let exit_code = match reason {
            "exited-normally" => Some(0),
            "exited" => results
                .child_data("exit-code")
                .and_then(|code| i32::from_str_radix(code, 8).ok()),
            _ => None,
        };
        self.inferior_pid = None;
        if !self.state.has_live_inferior() {
            debug!(%reason, state = %self.state, "exit record ignored");
            return;
        }
        info!(%reason, ?exit_code, "inferior exited");
        self.set_state(AdapterState::InferiorShutDown);
        self.emit(AdapterNotification::InferiorExited { exit_code });
        self.emit(AdapterNotification::InferiorShutDown);
    }

    fn handle_notify_async(&mut self, class: &str, results: &MiValue) {
        match class {
            "thread-group-started" => {
                match results.child_data("pid").and_then(|p| p.parse::<u32>().ok()) {
                    Some(pid) => {
                        debug!(pid, "inferior pid");
                        self.inferior_pid = Some(pid);
                    }
                    None => warn!(%results, "thread group started without a pid"),
                }
            }
            "thread-group-exited" => self.inferior_pid = None,
            other => trace!(class = other, "notify record"),
        }
    }

    // Continuations

    fn handle_file_exec_and_symbols(&mut self, response: &MiResponse) {
        require_state!(self, "file-exec-and-symbols reply", InferiorPreparing);
        if response.result_class == ResultClass::Done {
            self.set_state(AdapterState::InferiorPrepared);
            self.emit(AdapterNotification::InferiorPrepared);
        } else {
            self.fail_preparation(messages::executable_failed(response.error_message()));
        }
    }

    fn handle_remote_symbols(&mut self, response: &MiResponse) {
        require_state!(self, "file-exec-and-symbols reply", InferiorPreparing);
        if response.result_class != ResultClass::Done {
            self.fail_preparation(messages::executable_failed(response.error_message()));
            return;
        }
        if let AdapterKind::Remote { target } = &self.kind {
            let command = target_select_remote(target);
            self.post(MiCommand::new(command).with_callback(
                "handle_target_remote",
                Self::handle_target_remote,
            ));
        }
    }

    fn handle_target_remote(&mut self, response: &MiResponse) {
        require_state!(self, "target-select reply", InferiorPreparing);
        match response.result_class {
            ResultClass::Done | ResultClass::Connected => {
                self.set_state(AdapterState::InferiorPrepared);
                self.emit(AdapterNotification::InferiorPrepared);
            }
            _ => {
                self.fail_preparation(messages::remote_connect_failed(response.error_message()))
            }
        }
    }

    fn fail_preparation(&mut self, message: String) {
        warn!(%message, "inferior preparation failed");
        self.set_state(AdapterState::InferiorPreparationFailed);
        self.emit(AdapterNotification::InferiorPreparationFailed(message));
    }

    fn handle_exec_run(&mut self, response: &MiResponse) {
        if response.result_class == ResultClass::Running {
            if self.state == AdapterState::InferiorRunning {
                info!("inferior started");
                self.emit(AdapterNotification::StatusMessage(
                    messages::MSG_INFERIOR_STARTED.to_string(),
                ));
                self.emit(AdapterNotification::InferiorStarted);
            } else {
                debug!(state = %self.state, "run acknowledged after state moved on");
            }
            return;
        }
        let message = response.error_message().to_string();
        if self.state != AdapterState::InferiorRunningRequested {
            warn!(%message, state = %self.state, "late run error ignored");
            return;
        }
        warn!(%message, "inferior start failed");
        self.set_state(AdapterState::InferiorStartFailed);
        self.emit(AdapterNotification::InferiorStartFailed(message));
    }

    fn handle_exec_interrupt(&mut self, response: &MiResponse) {
        if response.result_class != ResultClass::Error {
            return;
        }
        warn!(msg = response.error_message(), "interrupt failed");
        if self.state == AdapterState::InferiorStopping {
            self.set_state(AdapterState::InferiorRunning);
        }
        self.emit(AdapterNotification::StatusMessage(format!(
            "Cannot interrupt inferior: {}",
            response.error_message()
        )));
    }

    fn handle_kill(&mut self, response: &MiResponse) {
        require_state!(self, "kill reply", InferiorShuttingDown);
        if response.result_class == ResultClass::Done {
            self.set_state(AdapterState::InferiorShutDown);
            self.emit(AdapterNotification::InferiorShutDown);
            // Second round: exit gdb itself.
            self.shutdown();
        } else {
            let message = messages::inferior_stop_failed(response.error_message());
            warn!(%message, "kill failed");
            self.set_state(AdapterState::InferiorShutdownFailed);
            self.emit(AdapterNotification::InferiorShutdownFailed(message));
        }
    }

    fn handle_exit(&mut self, response: &MiResponse) {
        match response.result_class {
            // Wait for the process to go away.
            ResultClass::Done | ResultClass::Exit => {}
            _ => {
                let message = messages::gdb_stop_failed(response.error_message());
                warn!(%message, "gdb exit failed");
                self.emit(AdapterNotification::AdapterShutdownFailed(message));
            }
        }
    }
}

impl<S: Supervisor> DebuggerAdapter for GdbAdapter<S> {
    fn state(&self) -> AdapterState {
        self.state
    }

    fn start_adapter(&mut self) {
        require_state!(self, "start_adapter", Starting);
        if self.supervisor.is_running() {
            contract_violation("start_adapter (already spawned)", self.state);
        }
        info!(kind = ?self.kind, "trying to start adapter");

        let mut args = Vec::new();
        if self.kind.uses_side_channel() {
            match self.supervisor.open_side_channel() {
                Ok(tty) => args.push(format!("--tty={}", tty.display())),
                Err(e) => {
                    let message = messages::side_channel_failed(&e.to_string());
                    error!(%message, "adapter start failed");
                    self.emit(AdapterNotification::AdapterStartFailed(message));
                    return;
                }
            }
        }
        args.extend(["-i".to_string(), "mi".to_string()]);

        let launch = ProcessLaunch {
            args,
            working_dir: self.params.working_dir.clone(),
            environment: self.params.environment.clone(),
        };
        if let Err(e) = self.supervisor.spawn(launch) {
            self.supervisor.close_side_channel();
            let message = match &e {
                SupervisorError::Spawn { program, source } => {
                    messages::gdb_failed_to_start(program, &source.to_string())
                }
                other => other.to_string(),
            };
            error!(%message, "adapter start failed");
            self.emit(AdapterNotification::AdapterStartFailed(message));
        }
    }

    fn prepare_inferior(&mut self) {
        require_state!(self, "prepare_inferior", Started);
        self.set_state(AdapterState::InferiorPreparing);

        if let Some(index) = self
            .params
            .process_args
            .iter()
            .position(|arg| arg.contains(['\n', '\r']))
        {
            self.fail_preparation(messages::unsendable_argument(index));
            return;
        }
        if !self.params.process_args.is_empty() {
            let command = exec_arguments(&self.params.process_args);
            if !self.post(MiCommand::new(command)) {
                return;
            }
        }
        let command = file_exec_and_symbols(&self.params.absolute_executable());
        let command = match self.kind {
            AdapterKind::Plain => MiCommand::new(command).with_callback(
                "handle_file_exec_and_symbols",
                Self::handle_file_exec_and_symbols,
            ),
            AdapterKind::Remote { .. } => MiCommand::new(command)
                .with_callback("handle_remote_symbols", Self::handle_remote_symbols),
        };
        self.post(command);
    }

    fn mark_inferior_starting(&mut self) {
        require_state!(self, "mark_inferior_starting", InferiorPrepared);
        self.set_state(AdapterState::InferiorStarting);
    }

    fn start_inferior(&mut self) {
        require_state!(self, "start_inferior", InferiorStarting);
        self.set_state(AdapterState::InferiorRunningRequested);
        let command = match self.kind {
            AdapterKind::Plain => EXEC_RUN,
            AdapterKind::Remote { .. } => EXEC_CONTINUE,
        };
        self.post(
            MiCommand::new(command)
                .run_request()
                .with_callback("handle_exec_run", Self::handle_exec_run),
        );
    }

    fn interrupt_inferior(&mut self) {
        match self.kind {
            AdapterKind::Plain => {
                let Some(pid) = self.inferior_pid else {
                    debug!(state = %self.state, "no inferior to interrupt");
                    return;
                };
                require_state!(self, "interrupt_inferior", InferiorRunning);
                self.set_state(AdapterState::InferiorStopping);
                if let Err(e) = self.supervisor.interrupt(pid) {
                    warn!(pid, error = %e, "cannot interrupt inferior");
                    self.set_state(AdapterState::InferiorRunning);
                    self.emit(AdapterNotification::StatusMessage(format!(
                        "Cannot interrupt inferior: {e}"
                    )));
                }
            }
            AdapterKind::Remote { .. } => {
                require_state!(self, "interrupt_inferior", InferiorRunning);
                self.set_state(AdapterState::InferiorStopping);
                self.post(
                    MiCommand::new(EXEC_INTERRUPT)
                        .with_callback("handle_exec_interrupt", Self::handle_exec_interrupt),
                );
            }
        }
    }

    fn shutdown(&mut self) {
        if self.terminating {
            debug!(state = %self.state, "shutdown ignored while terminating");
            return;
        }
        info!(state = %self.state, "adapter shutdown");
        self.supervisor.close_side_channel();

        if self.state.has_live_inferior() {
            self.set_state(AdapterState::InferiorShuttingDown);
            self.post(MiCommand::new(KILL).with_callback("handle_kill", Self::handle_kill));
        } else if self.state.can_exit_debugger() {
            self.set_state(AdapterState::AdapterShuttingDown);
            self.post(MiCommand::new(GDB_EXIT).with_callback("handle_exit", Self::handle_exit));
        } else {
            contract_violation("shutdown", self.state);
        }
    }

    fn terminate(&mut self) {
        info!(state = %self.state, "terminating gdb");
        self.terminating = true;
        self.supervisor.close_side_channel();
        let abandoned = self.channel.drain();
        if abandoned > 0 {
            debug!(abandoned, "pending commands dropped");
        }
        if self.supervisor.is_running() {
            self.supervisor.terminate();
        } else if self.state != AdapterState::AdapterShutDown {
            self.set_state(AdapterState::AdapterShutDown);
            self.emit(AdapterNotification::AdapterShutDown);
        }
    }

    fn handle_process_event(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Started { pid } => self.handle_gdb_started(pid),
            ProcessEvent::Stdout(line) => {
                trace!(%line, "gdb stdout");
                self.handle_output_line(&line);
            }
            ProcessEvent::Stderr(line) => {
                warn!(%line, "gdb stderr");
                self.emit(AdapterNotification::ConsoleOutput(format!("{line}\n")));
            }
            ProcessEvent::DebuggeeOutput(bytes) => {
                self.emit(AdapterNotification::DebuggeeOutput(bytes));
            }
            ProcessEvent::Error(failure) => self.handle_gdb_error(failure),
            ProcessEvent::Exited { code } => self.handle_gdb_finished(code),
        }
    }

    fn check_timeouts(&mut self, now: Instant) {
        let Some(limit) = self.command_timeout else {
            return;
        };
        if self.terminating {
            return;
        }
        let Some(message) = self
            .channel
            .overdue(now, limit)
            .map(|(command, waited)| messages::command_timed_out(command, waited))
        else {
            return;
        };
        error!(%message, "gdb not responding");
        self.emit(AdapterNotification::AdapterCrashed(message));
        self.terminate();
    }
}
