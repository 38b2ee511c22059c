use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use quill_config::{load_config, load_user_config, Config, LogConfig};
use quill_debugger::{
    spawn_gdb_adapter, AdapterHandle, AdapterKind, AdapterNotification, AdapterRequest,
    AdapterState, StartParameters, SupervisorConfig,
};
use quill_platform::logging::{default_log_file_path, Rotation};
use quill_platform::paths::{DefaultPaths, PlatformPaths};

/// Run a program under gdb's machine interface.
#[derive(Debug, Parser)]
#[command(name = "quill", version)]
struct Cli {
    /// Debugger binary (overrides `debugger.gdb_path`).
    #[arg(long, value_name = "PATH")]
    gdb: Option<String>,

    /// Attach to a gdbserver instead of launching locally.
    #[arg(long, value_name = "HOST:PORT")]
    remote: Option<String>,

    /// Working directory for the debugger and the program.
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Extra environment variable for the program. Repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Directory holding `config.toml`.
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Print adapter notifications as JSON lines on stderr.
    #[arg(long)]
    json: bool,

    /// Program to debug.
    program: PathBuf,

    /// Arguments passed to the program.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

fn init_logging(log: &LogConfig) -> Result<()> {
    let path = log.file.clone().unwrap_or_else(default_log_file_path);
    let file = Rotation::default()
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log.level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Prints notifications for a human or as JSON lines.
struct Output {
    json: bool,
}

impl Output {
    fn show(&self, note: &AdapterNotification) -> Result<()> {
        if let AdapterNotification::DebuggeeOutput(bytes) = note {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).context("failed to write program output")?;
            stdout.flush().context("failed to write program output")?;
            return Ok(());
        }
        if self.json {
            let line = serde_json::to_string(note).context("failed to encode notification")?;
            eprintln!("{line}");
            return Ok(());
        }
        match note {
            AdapterNotification::ConsoleOutput(text) => eprint!("{text}"),
            AdapterNotification::StatusMessage(text) => eprintln!("quill: {text}"),
            AdapterNotification::InferiorStopped { reason } => {
                eprintln!("quill: program stopped ({reason})")
            }
            AdapterNotification::InferiorExited {
                exit_code: Some(code),
            } => eprintln!("quill: program exited with code {code}"),
            AdapterNotification::InferiorExited { exit_code: None } => {
                eprintln!("quill: program terminated by a signal")
            }
            AdapterNotification::AdapterStartFailed(msg)
            | AdapterNotification::InferiorPreparationFailed(msg)
            | AdapterNotification::InferiorStartFailed(msg)
            | AdapterNotification::InferiorShutdownFailed(msg)
            | AdapterNotification::AdapterShutdownFailed(msg)
            | AdapterNotification::AdapterCrashed(msg) => eprintln!("quill: {msg}"),
            _ => {}
        }
        Ok(())
    }
}

/// The engine side of one session: which requests are still allowed.
struct Session {
    handle: AdapterHandle,
    state: AdapterState,
    shutdown_requested: bool,
    exit_code: i32,
}

impl Session {
    fn request(&self, request: AdapterRequest) {
        if !self.handle.send(request) {
            warn!(?request, "adapter task already finished");
        }
    }

    /// Ask for an orderly shutdown once, if the adapter can take it now.
    fn request_shutdown(&mut self) {
        if self.shutdown_requested {
            return;
        }
        if self.state.has_live_inferior() || self.state.can_exit_debugger() {
            self.shutdown_requested = true;
            self.request(AdapterRequest::Shutdown);
        } else {
            self.request(AdapterRequest::Terminate);
        }
    }

    /// Advance the session in response to `note`. Returns `false` when done.
    fn react(&mut self, note: AdapterNotification) -> bool {
        match note {
            AdapterNotification::StateChanged { to, .. } => self.state = to,
            AdapterNotification::AdapterStarted => self.request(AdapterRequest::PrepareInferior),
            AdapterNotification::AdapterStartFailed(_) => {
                self.exit_code = 1;
                self.request(AdapterRequest::Terminate);
            }
            AdapterNotification::InferiorPrepared => {
                self.request(AdapterRequest::MarkInferiorStarting);
                self.request(AdapterRequest::StartInferior);
            }
            AdapterNotification::InferiorPreparationFailed(_)
            | AdapterNotification::InferiorStartFailed(_) => {
                self.exit_code = 1;
                self.request_shutdown();
            }
            AdapterNotification::InferiorExited { exit_code } => {
                self.exit_code = exit_code.unwrap_or(1);
            }
            AdapterNotification::InferiorStopped { .. } | AdapterNotification::InferiorShutDown => {
                self.request_shutdown();
            }
            AdapterNotification::InferiorShutdownFailed(_) => {
                self.exit_code = 1;
                // Retry goes straight to -gdb-exit.
                self.request(AdapterRequest::Shutdown);
            }
            AdapterNotification::AdapterShutdownFailed(_)
            | AdapterNotification::AdapterCrashed(_) => {
                self.exit_code = 1;
                self.request(AdapterRequest::Terminate);
            }
            AdapterNotification::AdapterShutDown => return false,
            _ => {}
        }
        true
    }

    fn interrupt(&mut self) {
        if self.state == AdapterState::InferiorRunning && !self.shutdown_requested {
            info!("interrupt requested");
            self.request(AdapterRequest::InterruptInferior);
        } else if self.shutdown_requested {
            self.request(AdapterRequest::Terminate);
        } else {
            self.request_shutdown();
        }
    }
}

async fn debug_session(cli: Cli, config: Config) -> Result<i32> {
    let kind = match cli.remote {
        Some(target) => AdapterKind::Remote { target },
        None => AdapterKind::Plain,
    };
    let params = StartParameters {
        executable: cli.program,
        process_args: cli.args,
        working_dir: cli.cwd,
        environment: cli.env.into_iter().collect(),
    };
    let supervisor = SupervisorConfig {
        gdb_path: cli.gdb.unwrap_or(config.debugger.gdb_path),
        extra_args: config.debugger.extra_args,
        tty_dir: config.debugger.tty_dir,
    };
    let timeout = match config.debugger.command_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    info!(?kind, executable = %params.executable.display(), "starting session");

    let (handle, mut notes) = spawn_gdb_adapter(kind, params, supervisor, timeout);
    let output = Output { json: cli.json };
    let mut session = Session {
        handle,
        state: AdapterState::Starting,
        shutdown_requested: false,
        exit_code: 0,
    };
    session.request(AdapterRequest::StartAdapter);

    loop {
        tokio::select! {
            note = notes.recv() => {
                let Some(note) = note else { break };
                output.show(&note)?;
                if !session.react(note) {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                session.interrupt();
            }
        }
    }

    let exit_code = session.exit_code;
    if let Err(e) = session.handle.join().await {
        error!(error = %e, "adapter task failed");
        bail!("debugger adapter failed: {e}");
    }
    Ok(exit_code)
}

fn run(cli: Cli) -> Result<i32> {
    let paths = DefaultPaths::new().context("failed to detect platform paths")?;
    let project_dir = env::current_dir().ok();
    let loaded = match &cli.config_dir {
        Some(dir) => load_config(dir, project_dir.as_deref()),
        None => load_user_config(&paths, project_dir.as_deref()),
    };
    let (mut config, config_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    if config.debugger.tty_dir.is_none() {
        config.debugger.tty_dir = Some(paths.runtime_dir());
    }

    init_logging(&config.log)?;
    if let Some(e) = config_error {
        error!("config load failed, using defaults: {}", e);
        eprintln!("quill: config load failed, using defaults: {e}");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(debug_session(cli, config))
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("quill: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_pair_splits_on_first_equals() {
        assert_eq!(
            parse_env_pair("OPTS=a=b").unwrap(),
            ("OPTS".to_string(), "a=b".to_string())
        );
        assert!(parse_env_pair("NOVALUE").is_err());
        assert!(parse_env_pair("=x").is_err());
    }

    #[test]
    fn cli_collects_program_arguments_verbatim() {
        let cli = Cli::try_parse_from([
            "quill", "--env", "A=1", "--json", "./app", "--flag", "-v", "input",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.program, PathBuf::from("./app"));
        assert_eq!(cli.args, vec!["--flag", "-v", "input"]);
        assert_eq!(cli.env, vec![("A".to_string(), "1".to_string())]);
    }

    #[test]
    fn cli_accepts_remote_target() {
        let cli = Cli::try_parse_from(["quill", "--remote", "localhost:3333", "app"]).unwrap();
        assert_eq!(cli.remote.as_deref(), Some("localhost:3333"));
        assert!(cli.args.is_empty());
    }
}
