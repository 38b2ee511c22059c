use std::process::Command;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use quill_debugger::{
    run_adapter, spawn_gdb_adapter, AdapterKind, AdapterNotification, AdapterRequest,
    GdbAdapter, MockSupervisor, ProcessEvent, StartParameters, SupervisorConfig,
};

// ── Scripted sessions against a mock supervisor ────────────────

struct Scripted {
    requests: mpsc::UnboundedSender<AdapterRequest>,
    events: mpsc::UnboundedSender<ProcessEvent>,
    notes: mpsc::UnboundedReceiver<AdapterNotification>,
    mock: MockSupervisor,
    task: JoinHandle<()>,
}

impl Scripted {
    fn new(kind: AdapterKind, params: StartParameters) -> Self {
        let mock = MockSupervisor::new();
        let (note_tx, notes) = mpsc::unbounded_channel();
        let (requests, request_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let adapter = GdbAdapter::new(kind, params, mock.clone(), note_tx);
        let task = tokio::spawn(run_adapter(adapter, request_rx, event_rx, false));
        Self {
            requests,
            events,
            notes,
            mock,
            task,
        }
    }

    fn request(&self, request: AdapterRequest) {
        self.requests.send(request).unwrap();
    }

    /// Yield until the adapter task has acted on the last request, so a
    /// reply injected next cannot overtake it in the runner's `select!`.
    async fn settle(&self, done: impl Fn(&MockSupervisor) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done(&self.mock) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("timed out waiting for the adapter to take a request");
    }

    fn gdb_says(&self, line: &str) {
        self.events.send(ProcessEvent::Stdout(line.to_string())).unwrap();
    }

    async fn expect(&mut self, expected: AdapterNotification) {
        assert_eq!(self.next().await, expected);
    }

    async fn next(&mut self) -> AdapterNotification {
        loop {
            let note = tokio::time::timeout(Duration::from_secs(5), self.notes.recv())
                .await
                .expect("timed out waiting for notification")
                .expect("notification stream closed");
            if !matches!(note, AdapterNotification::StateChanged { .. }) {
                return note;
            }
        }
    }
}

#[tokio::test]
async fn remote_session_connects_runs_and_exits() {
    let mut s = Scripted::new(
        AdapterKind::Remote {
            target: "10.0.0.2:2345".into(),
        },
        StartParameters::new("/opt/fw/firmware.elf"),
    );

    s.request(AdapterRequest::StartAdapter);
    s.settle(|m| m.launches().len() == 1).await;
    s.events.send(ProcessEvent::Started { pid: Some(10) }).unwrap();
    s.expect(AdapterNotification::AdapterStarted).await;

    s.request(AdapterRequest::PrepareInferior);
    s.settle(|m| m.commands().len() == 1).await;
    s.gdb_says(r#"~"Reading symbols from /opt/fw/firmware.elf...\n""#);
    s.gdb_says("^done");
    s.gdb_says("(gdb) ");
    s.expect(AdapterNotification::ConsoleOutput(
        "Reading symbols from /opt/fw/firmware.elf...\n".into(),
    ))
    .await;
    s.gdb_says("^connected");
    s.expect(AdapterNotification::InferiorPrepared).await;

    s.request(AdapterRequest::MarkInferiorStarting);
    s.request(AdapterRequest::StartInferior);
    s.settle(|m| m.commands().len() == 3).await;
    s.gdb_says("^running");
    s.expect(AdapterNotification::StatusMessage("Inferior started.".into()))
        .await;
    s.expect(AdapterNotification::InferiorStarted).await;

    s.gdb_says(r#"*stopped,reason="exited",exit-code="01""#);
    s.expect(AdapterNotification::InferiorExited { exit_code: Some(1) })
        .await;
    s.expect(AdapterNotification::InferiorShutDown).await;

    s.request(AdapterRequest::Shutdown);
    s.settle(|m| m.commands().len() == 4).await;
    s.gdb_says("^exit");
    s.events.send(ProcessEvent::Exited { code: Some(0) }).unwrap();
    s.expect(AdapterNotification::AdapterShutDown).await;
    s.task.await.unwrap();

    assert_eq!(
        s.mock.commands(),
        vec![
            r#"-file-exec-and-symbols "/opt/fw/firmware.elf""#,
            "-target-select remote 10.0.0.2:2345",
            "-exec-continue",
            "-gdb-exit",
        ]
    );
    assert!(s.mock.launches()[0].args.iter().all(|a| !a.starts_with("--tty")));
}

#[tokio::test]
async fn plain_session_relays_output_and_interrupts() {
    let mut params = StartParameters::new("/usr/local/bin/server");
    params.process_args = vec!["--port".into(), "8080".into()];
    let mut s = Scripted::new(AdapterKind::Plain, params);

    s.request(AdapterRequest::StartAdapter);
    s.settle(|m| m.launches().len() == 1).await;
    s.events.send(ProcessEvent::Started { pid: Some(10) }).unwrap();
    s.expect(AdapterNotification::AdapterStarted).await;

    s.request(AdapterRequest::PrepareInferior);
    s.settle(|m| m.commands().len() == 2).await;
    s.gdb_says("^done");
    s.gdb_says("^done");
    s.expect(AdapterNotification::InferiorPrepared).await;

    s.request(AdapterRequest::MarkInferiorStarting);
    s.request(AdapterRequest::StartInferior);
    s.settle(|m| m.commands().len() == 3).await;
    s.gdb_says(r#"=thread-group-started,id="i1",pid="4242""#);
    s.gdb_says("^running");
    s.gdb_says(r#"*running,thread-id="all""#);
    s.expect(AdapterNotification::StatusMessage("Inferior started.".into()))
        .await;
    s.expect(AdapterNotification::InferiorStarted).await;

    s.events
        .send(ProcessEvent::DebuggeeOutput(b"listening on 8080\n".to_vec()))
        .unwrap();
    s.expect(AdapterNotification::DebuggeeOutput(
        b"listening on 8080\n".to_vec(),
    ))
    .await;

    s.request(AdapterRequest::InterruptInferior);
    s.settle(|m| m.interrupts().len() == 1).await;
    s.gdb_says(r#"*stopped,reason="signal-received",signal-name="SIGINT""#);
    s.expect(AdapterNotification::InferiorStopped {
        reason: "signal-received".into(),
    })
    .await;
    assert_eq!(s.mock.interrupts(), vec![4242]);

    s.request(AdapterRequest::Shutdown);
    s.settle(|m| m.commands().len() == 4).await;
    s.gdb_says("^done");
    s.expect(AdapterNotification::InferiorShutDown).await;
    s.gdb_says("^exit");
    s.events.send(ProcessEvent::Exited { code: Some(0) }).unwrap();
    s.expect(AdapterNotification::AdapterShutDown).await;
    s.task.await.unwrap();

    assert_eq!(
        s.mock.commands(),
        vec![
            "-exec-arguments --port 8080",
            r#"-file-exec-and-symbols "/usr/local/bin/server""#,
            "-exec-run",
            "kill",
            "-gdb-exit",
        ]
    );
    assert!(!s.mock.side_channel_open());
}

#[tokio::test]
async fn crash_mid_session_drops_pending_replies() {
    let mut s = Scripted::new(AdapterKind::Plain, StartParameters::new("/bin/app"));
    s.request(AdapterRequest::StartAdapter);
    s.settle(|m| m.launches().len() == 1).await;
    s.events.send(ProcessEvent::Started { pid: None }).unwrap();
    s.expect(AdapterNotification::AdapterStarted).await;

    s.request(AdapterRequest::PrepareInferior);
    s.settle(|m| m.commands().len() == 1).await;
    s.events.send(ProcessEvent::Exited { code: Some(139) }).unwrap();
    match s.next().await {
        AdapterNotification::AdapterCrashed(reason) => assert!(reason.contains("139")),
        other => panic!("unexpected notification {other:?}"),
    }
    s.expect(AdapterNotification::AdapterShutDown).await;
    s.task.await.unwrap();
}

// ── Real gdb, when one is installed ────────────────────────────

fn gdb_available() -> bool {
    Command::new("gdb")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn real_gdb_session_reaches_shutdown() {
    if !gdb_available() || !std::path::Path::new("/bin/true").exists() {
        eprintln!("gdb not installed; skipping");
        return;
    }
    let config = SupervisorConfig {
        extra_args: vec!["-nx".into(), "-q".into()],
        ..SupervisorConfig::default()
    };
    let (handle, mut notes) = spawn_gdb_adapter(
        AdapterKind::Plain,
        StartParameters::new("/bin/true"),
        config,
        Some(Duration::from_secs(20)),
    );
    handle.send(AdapterRequest::StartAdapter);

    let mut seen = Vec::new();
    let mut shutdown_sent = false;
    loop {
        let note = tokio::time::timeout(Duration::from_secs(60), notes.recv())
            .await
            .expect("gdb session timed out")
            .expect("notification stream closed");
        match &note {
            AdapterNotification::AdapterStarted => {
                handle.send(AdapterRequest::PrepareInferior);
            }
            AdapterNotification::InferiorPrepared => {
                handle.send(AdapterRequest::MarkInferiorStarting);
                handle.send(AdapterRequest::StartInferior);
            }
            AdapterNotification::InferiorShutDown
            | AdapterNotification::InferiorStartFailed(_)
            | AdapterNotification::InferiorPreparationFailed(_)
                if !shutdown_sent =>
            {
                shutdown_sent = true;
                handle.send(AdapterRequest::Shutdown);
            }
            AdapterNotification::AdapterShutDown => break,
            _ => {}
        }
        seen.push(note);
    }
    handle.join().await.unwrap();

    assert!(seen.contains(&AdapterNotification::AdapterStarted));
    assert!(seen.contains(&AdapterNotification::InferiorPrepared));
    assert!(!seen
        .iter()
        .any(|n| matches!(n, AdapterNotification::AdapterCrashed(_))));
}
