//! The debuggee's terminal: a FIFO gdb hands to the inferior via `--tty`.

pub use imp::OutputCollector;

#[cfg(unix)]
mod imp {
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::unix::pipe;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};

    use crate::error::SupervisorError;
    use crate::supervisor::ProcessEvent;

    /// Reads the FIFO and forwards chunks as [`ProcessEvent::DebuggeeOutput`].
    /// Dropping it stops the reader and removes the FIFO.
    pub struct OutputCollector {
        path: PathBuf,
        reader: JoinHandle<()>,
        // Held open so the reader never sees EOF between inferior runs.
        _keepalive: pipe::Sender,
        _dir: TempDir,
    }

    impl OutputCollector {
        pub fn listen(
            parent: Option<&Path>,
            events: mpsc::UnboundedSender<ProcessEvent>,
        ) -> Result<Self, SupervisorError> {
            let mut builder = tempfile::Builder::new();
            builder.prefix("quill-tty-");
            let dir = match parent {
                Some(parent) => builder.tempdir_in(parent),
                None => builder.tempdir(),
            }
            .map_err(side_channel_error)?;

            let path = dir.path().join("tty");
            quill_platform::make_fifo(&path)
                .map_err(|e| SupervisorError::SideChannel(e.to_string()))?;
            let mut receiver = pipe::OpenOptions::new()
                .open_receiver(&path)
                .map_err(side_channel_error)?;
            let keepalive = pipe::OpenOptions::new()
                .open_sender(&path)
                .map_err(side_channel_error)?;

            let reader = tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                loop {
                    match receiver.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            if events
                                .send(ProcessEvent::DebuggeeOutput(buf[..n].to_vec()))
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "side channel read failed");
                            break;
                        }
                    }
                }
                debug!("side channel reader finished");
            });

            Ok(Self {
                path,
                reader,
                _keepalive: keepalive,
                _dir: dir,
            })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for OutputCollector {
        fn drop(&mut self) {
            self.reader.abort();
        }
    }

    fn side_channel_error(e: std::io::Error) -> SupervisorError {
        SupervisorError::SideChannel(e.to_string())
    }
}

#[cfg(not(unix))]
mod imp {
    use std::path::Path;

    use tokio::sync::mpsc;

    use crate::error::SupervisorError;
    use crate::supervisor::ProcessEvent;

    pub struct OutputCollector {
        _never: std::convert::Infallible,
    }

    impl OutputCollector {
        pub fn listen(
            _parent: Option<&Path>,
            _events: mpsc::UnboundedSender<ProcessEvent>,
        ) -> Result<Self, SupervisorError> {
            Err(SupervisorError::SideChannel(
                "named pipes are not supported on this platform".into(),
            ))
        }

        pub fn path(&self) -> &Path {
            match self._never {}
        }
    }
}
