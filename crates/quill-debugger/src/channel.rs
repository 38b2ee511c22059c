//! FIFO correlation of MI commands with their result records.
//!
//! gdb answers commands strictly in the order it read them, so every
//! command written is queued here and the next `^` record belongs to the
//! oldest entry. Commands are written without tokens.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use quill_mi::{encode_command, MiRecord, MiResponse};
use tracing::{debug, warn};

use crate::error::SupervisorError;
use crate::supervisor::Supervisor;

/// Continuation run with the owner `C` when the reply arrives.
pub type Continuation<C> = Box<dyn FnOnce(&mut C, &MiResponse) + Send>;

/// How the channel treats a command's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Generic,
    /// Resumes the inferior; a `^running` reply promotes the adapter to
    /// running before the continuation is invoked.
    RunRequest,
}

/// A command about to be written.
pub struct MiCommand<C> {
    pub text: String,
    pub kind: CommandKind,
    pub callback: Option<Continuation<C>>,
    /// Name of the continuation, for logs.
    pub callback_name: &'static str,
}

impl<C> MiCommand<C> {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: CommandKind::Generic,
            callback: None,
            callback_name: "",
        }
    }

    pub fn with_callback(
        mut self,
        name: &'static str,
        callback: impl FnOnce(&mut C, &MiResponse) + Send + 'static,
    ) -> Self {
        self.callback = Some(Box::new(callback));
        self.callback_name = name;
        self
    }

    pub fn run_request(mut self) -> Self {
        self.kind = CommandKind::RunRequest;
        self
    }
}

/// A command that was written and awaits its reply.
pub struct PendingCommand<C> {
    pub text: String,
    pub kind: CommandKind,
    pub callback: Option<Continuation<C>>,
    pub callback_name: &'static str,
    pub issued_at: Instant,
}

impl<C> std::fmt::Debug for PendingCommand<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCommand")
            .field("text", &self.text)
            .field("kind", &self.kind)
            .field("callback", &self.callback_name)
            .finish()
    }
}

/// Outcome of feeding one record to the channel.
#[derive(Debug)]
pub enum Dispatch<C> {
    /// A result record matched to the oldest pending command.
    Reply {
        pending: PendingCommand<C>,
        response: MiResponse,
    },
    /// Anything not answering a command: async, stream, prompt, raw, or a
    /// result nobody was waiting for.
    Unsolicited(MiRecord),
}

/// Queue of commands awaiting replies.
pub struct CommandChannel<C> {
    pending: VecDeque<PendingCommand<C>>,
}

impl<C> Default for CommandChannel<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CommandChannel<C> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    /// Write `command` to `writer` and queue it.
    ///
    /// A command that cannot be written is not queued.
    pub fn send<W: Supervisor + ?Sized>(
        &mut self,
        command: MiCommand<C>,
        writer: &mut W,
    ) -> Result<(), SupervisorError> {
        let bytes = encode_command(&command.text)?;
        writer.write(bytes)?;
        debug!(command = %command.text, callback = command.callback_name, "sent");
        self.pending.push_back(PendingCommand {
            text: command.text,
            kind: command.kind,
            callback: command.callback,
            callback_name: command.callback_name,
            issued_at: Instant::now(),
        });
        Ok(())
    }

    /// Route one parsed record.
    pub fn dispatch(&mut self, record: MiRecord) -> Dispatch<C> {
        let MiRecord::Result {
            token,
            class,
            results,
        } = record
        else {
            return Dispatch::Unsolicited(record);
        };
        match self.pending.pop_front() {
            Some(pending) => Dispatch::Reply {
                pending,
                response: MiResponse::new(class, results),
            },
            None => {
                warn!(?class, "result record with no command pending");
                Dispatch::Unsolicited(MiRecord::Result {
                    token,
                    class,
                    results,
                })
            }
        }
    }

    /// Drop every pending command without running its continuation.
    /// Returns how many were dropped.
    pub fn drain(&mut self) -> usize {
        let n = self.pending.len();
        for cmd in self.pending.drain(..) {
            debug!(command = %cmd.text, "abandoned");
        }
        n
    }

    /// The oldest command if it has waited longer than `limit`.
    pub fn overdue(&self, now: Instant, limit: Duration) -> Option<(&str, Duration)> {
        let oldest = self.pending.front()?;
        let waited = now.saturating_duration_since(oldest.issued_at);
        (waited > limit).then_some((oldest.text.as_str(), waited))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}
