//! One tokio task per adapter.
//!
//! The task owns the adapter and is the only place its state changes:
//! engine requests, process events and the timeout tick are all handled
//! one at a time from a single `select!` loop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::adapter::{DebuggerAdapter, GdbAdapter};
use crate::notification::AdapterNotification;
use crate::params::{AdapterKind, StartParameters};
use crate::state::AdapterState;
use crate::supervisor::{GdbSupervisor, ProcessEvent, SupervisorConfig};

/// How often pending commands are checked against the timeout.
const TIMEOUT_TICK: Duration = Duration::from_secs(1);

/// An engine request, applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterRequest {
    StartAdapter,
    PrepareInferior,
    MarkInferiorStarting,
    StartInferior,
    InterruptInferior,
    Shutdown,
    Terminate,
}

/// Sending side of a running adapter task.
#[derive(Debug)]
pub struct AdapterHandle {
    requests: mpsc::UnboundedSender<AdapterRequest>,
    task: JoinHandle<()>,
}

impl AdapterHandle {
    /// Queue `request`. Returns `false` once the task has finished.
    pub fn send(&self, request: AdapterRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to end. An error means the adapter panicked.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        drop(self.requests);
        self.task.await
    }
}

/// Spawn gdb's adapter task on the current runtime.
pub fn spawn_gdb_adapter(
    kind: AdapterKind,
    params: StartParameters,
    config: SupervisorConfig,
    command_timeout: Option<Duration>,
) -> (AdapterHandle, mpsc::UnboundedReceiver<AdapterNotification>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (note_tx, note_rx) = mpsc::unbounded_channel();
    let (request_tx, request_rx) = mpsc::unbounded_channel();

    let supervisor = GdbSupervisor::new(config, event_tx);
    let adapter =
        GdbAdapter::new(kind, params, supervisor, note_tx).with_command_timeout(command_timeout);
    let task = tokio::spawn(run_adapter(adapter, request_rx, event_rx, command_timeout.is_some()));

    (
        AdapterHandle {
            requests: request_tx,
            task,
        },
        note_rx,
    )
}

/// Drive `adapter` until it reaches `AdapterShutDown`.
///
/// Dropping every request sender terminates the adapter.
pub async fn run_adapter<A: DebuggerAdapter>(
    mut adapter: A,
    mut requests: mpsc::UnboundedReceiver<AdapterRequest>,
    mut events: mpsc::UnboundedReceiver<ProcessEvent>,
    watch_timeouts: bool,
) {
    let mut tick = interval(TIMEOUT_TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut requests_open = true;

    loop {
        tokio::select! {
            Some(event) = events.recv() => adapter.handle_process_event(event),
            request = requests.recv(), if requests_open => match request {
                Some(request) => apply(&mut adapter, request),
                None => {
                    debug!("engine went away");
                    requests_open = false;
                    adapter.terminate();
                }
            },
            _ = tick.tick(), if watch_timeouts => adapter.check_timeouts(Instant::now().into_std()),
            else => break,
        }
        if adapter.state() == AdapterState::AdapterShutDown {
            break;
        }
    }
    info!("adapter task finished");
}

fn apply<A: DebuggerAdapter>(adapter: &mut A, request: AdapterRequest) {
    debug!(?request, state = %adapter.state(), "request");
    match request {
        AdapterRequest::StartAdapter => adapter.start_adapter(),
        AdapterRequest::PrepareInferior => adapter.prepare_inferior(),
        AdapterRequest::MarkInferiorStarting => adapter.mark_inferior_starting(),
        AdapterRequest::StartInferior => adapter.start_inferior(),
        AdapterRequest::InterruptInferior => adapter.interrupt_inferior(),
        AdapterRequest::Shutdown => adapter.shutdown(),
        AdapterRequest::Terminate => adapter.terminate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSupervisor;

    struct Session {
        requests: mpsc::UnboundedSender<AdapterRequest>,
        events: mpsc::UnboundedSender<ProcessEvent>,
        notes: mpsc::UnboundedReceiver<AdapterNotification>,
        mock: MockSupervisor,
        task: JoinHandle<()>,
    }

    fn session(timeout: Option<Duration>) -> Session {
        let mock = MockSupervisor::new();
        let (note_tx, notes) = mpsc::unbounded_channel();
        let (requests, request_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let adapter = GdbAdapter::new(
            AdapterKind::Plain,
            StartParameters::new("/bin/true"),
            mock.clone(),
            note_tx,
        )
        .with_command_timeout(timeout);
        let task = tokio::spawn(run_adapter(adapter, request_rx, event_rx, timeout.is_some()));
        Session {
            requests,
            events,
            notes,
            mock,
            task,
        }
    }

    /// Yield until the task has acted on the last request, so a reply
    /// injected next cannot overtake it in `select!`.
    async fn settle(mock: &MockSupervisor, done: impl Fn(&MockSupervisor) -> bool) {
        while !done(mock) {
            tokio::task::yield_now().await;
        }
    }

    async fn next_note(
        notes: &mut mpsc::UnboundedReceiver<AdapterNotification>,
    ) -> AdapterNotification {
        loop {
            let note = tokio::time::timeout(Duration::from_secs(60), notes.recv())
                .await
                .expect("timed out")
                .expect("notification stream closed");
            if !matches!(note, AdapterNotification::StateChanged { .. }) {
                return note;
            }
        }
    }

    #[tokio::test]
    async fn full_session_runs_to_shutdown() {
        let mut s = session(None);
        s.requests.send(AdapterRequest::StartAdapter).unwrap();
        settle(&s.mock, |m| m.launches().len() == 1).await;
        s.events.send(ProcessEvent::Started { pid: Some(7) }).unwrap();
        assert_eq!(next_note(&mut s.notes).await, AdapterNotification::AdapterStarted);

        s.requests.send(AdapterRequest::PrepareInferior).unwrap();
        settle(&s.mock, |m| m.commands().len() == 1).await;
        s.events.send(ProcessEvent::Stdout("^done".into())).unwrap();
        assert_eq!(next_note(&mut s.notes).await, AdapterNotification::InferiorPrepared);

        s.requests.send(AdapterRequest::MarkInferiorStarting).unwrap();
        s.requests.send(AdapterRequest::StartInferior).unwrap();
        settle(&s.mock, |m| m.commands().len() == 2).await;
        s.events.send(ProcessEvent::Stdout("^running".into())).unwrap();
        assert_eq!(
            next_note(&mut s.notes).await,
            AdapterNotification::StatusMessage("Inferior started.".into())
        );
        assert_eq!(next_note(&mut s.notes).await, AdapterNotification::InferiorStarted);

        s.requests.send(AdapterRequest::Shutdown).unwrap();
        settle(&s.mock, |m| m.commands().len() == 3).await;
        s.events.send(ProcessEvent::Stdout("^done".into())).unwrap();
        assert_eq!(next_note(&mut s.notes).await, AdapterNotification::InferiorShutDown);
        s.events.send(ProcessEvent::Stdout("^exit".into())).unwrap();
        s.events.send(ProcessEvent::Exited { code: Some(0) }).unwrap();
        assert_eq!(next_note(&mut s.notes).await, AdapterNotification::AdapterShutDown);

        s.task.await.unwrap();
        assert_eq!(
            s.mock.commands(),
            vec![
                r#"-file-exec-and-symbols "/bin/true""#.to_string(),
                "-exec-run".to_string(),
                "kill".to_string(),
                "-gdb-exit".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hung_gdb_is_terminated_after_timeout() {
        let mut s = session(Some(Duration::from_secs(20)));
        s.requests.send(AdapterRequest::StartAdapter).unwrap();
        settle(&s.mock, |m| m.launches().len() == 1).await;
        s.events.send(ProcessEvent::Started { pid: None }).unwrap();
        assert_eq!(next_note(&mut s.notes).await, AdapterNotification::AdapterStarted);
        s.requests.send(AdapterRequest::PrepareInferior).unwrap();

        match next_note(&mut s.notes).await {
            AdapterNotification::AdapterCrashed(msg) => assert!(msg.contains("not responding")),
            other => panic!("unexpected notification {other:?}"),
        }
        assert_eq!(s.mock.terminations(), 1);

        s.events.send(ProcessEvent::Exited { code: None }).unwrap();
        assert_eq!(next_note(&mut s.notes).await, AdapterNotification::AdapterShutDown);
        s.task.await.unwrap();
    }

    #[tokio::test]
    async fn dropping_requests_terminates() {
        let Session {
            requests,
            events,
            mut notes,
            mock,
            task,
        } = session(None);
        requests.send(AdapterRequest::StartAdapter).unwrap();
        settle(&mock, |m| m.launches().len() == 1).await;
        events.send(ProcessEvent::Started { pid: None }).unwrap();
        assert_eq!(next_note(&mut notes).await, AdapterNotification::AdapterStarted);

        drop(requests);
        while mock.terminations() == 0 {
            tokio::task::yield_now().await;
        }
        events.send(ProcessEvent::Exited { code: None }).unwrap();
        assert_eq!(next_note(&mut notes).await, AdapterNotification::AdapterShutDown);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn contract_violation_ends_the_task() {
        let s = session(None);
        s.requests.send(AdapterRequest::StartInferior).unwrap();
        let err = s.task.await.unwrap_err();
        assert!(err.is_panic());
    }
}
