use std::io::{Read as IoRead, Write as IoWrite};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::command::GatewayCommand;
use crate::error::{Result, SessionError};
use crate::interact::{self, DETACH_KEY};
use crate::transport::{HandoffEnd, Launcher, ReadEvent, Transport};

// ---------------------------------------------------------------------------
// PtyHandle
// ---------------------------------------------------------------------------

/// A process running inside a pseudo-terminal, with its output and input
/// pumped through channels by two OS threads.
pub struct PtyHandle {
    pub id: Uuid,
    reader: flume::Receiver<Vec<u8>>,
    writer: flume::Sender<Vec<u8>>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    master: Mutex<Box<dyn portable_pty::MasterPty + Send>>,
    released: bool,
    _reader_thread: Option<std::thread::JoinHandle<()>>,
    _writer_thread: Option<std::thread::JoinHandle<()>>,
}

impl PtyHandle {
    /// Spawn `cmd` inside a new PTY of the given size.
    pub fn spawn(cmd: &str, args: &[String], size: PtySize) -> Result<Self> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(size)
            .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;

        let mut command = CommandBuilder::new(cmd);
        for arg in args {
            command.arg(arg);
        }

        let child = pair
            .slave
            .spawn_command(command)
            .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;
        // Only the child may hold the slave side, or EOF is never seen.
        drop(pair.slave);

        let handle_id = Uuid::new_v4();
        debug!(%handle_id, cmd, ?args, "spawned PTY process");

        // -- output reader thread --
        let (read_tx, read_rx) = flume::bounded::<Vec<u8>>(256);
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;
        let reader_thread = std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if read_tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        // EIO is expected on Linux once the child exits
                        if e.kind() != std::io::ErrorKind::Other {
                            debug!("pty reader error: {e}");
                        }
                        break;
                    }
                }
            }
        });

        // -- input writer thread --
        let (write_tx, write_rx) = flume::bounded::<Vec<u8>>(256);
        let mut writer = pair
            .master
            .take_writer()
            .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;
        let writer_thread = std::thread::spawn(move || {
            while let Ok(data) = write_rx.recv() {
                // Credentials travel through here; wipe each buffer once written.
                let data = Zeroizing::new(data);
                if writer.write_all(&data).is_err() {
                    break;
                }
                let _ = writer.flush();
            }
        });

        Ok(PtyHandle {
            id: handle_id,
            reader: read_rx,
            writer: write_tx,
            child,
            master: Mutex::new(pair.master),
            released: false,
            _reader_thread: Some(reader_thread),
            _writer_thread: Some(writer_thread),
        })
    }

    /// Check whether the underlying child process is still running.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Send bytes to the PTY input.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.writer
            .send(data.to_vec())
            .map_err(|e| SessionError::Internal(format!("writer channel closed: {e}")))?;
        Ok(())
    }

    /// Resize the PTY to the given dimensions.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let master = self.master.lock().unwrap_or_else(|e| {
            warn!("master lock was poisoned, recovering");
            e.into_inner()
        });
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SessionError::Internal(format!("resize failed: {e}")))?;
        debug!(cols, rows, "PTY resized");
        Ok(())
    }

    fn release_child(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match self.child.try_wait() {
            Ok(Some(status)) => {
                info!(handle_id = %self.id, ?status, "subordinate already exited");
            }
            _ => {
                if let Err(e) = self.child.kill() {
                    warn!(handle_id = %self.id, "failed to kill subordinate: {e}");
                }
                match self.child.wait() {
                    Ok(status) => info!(handle_id = %self.id, ?status, "subordinate reaped"),
                    Err(e) => warn!(handle_id = %self.id, "failed to reap subordinate: {e}"),
                }
            }
        }
    }
}

#[async_trait]
impl Transport for PtyHandle {
    async fn read_chunk(&mut self, timeout: Duration) -> ReadEvent {
        match tokio::time::timeout(timeout, self.reader.recv_async()).await {
            Ok(Ok(bytes)) => ReadEvent::Data(bytes),
            Ok(Err(_)) => ReadEvent::Closed,
            Err(_) => ReadEvent::TimedOut,
        }
    }

    fn send_line(&mut self, line: &[u8]) -> Result<()> {
        let mut data = Zeroizing::new(Vec::with_capacity(line.len() + 1));
        data.extend_from_slice(line);
        data.push(b'\n');
        self.send(&data)
    }

    async fn hand_off(&mut self, pending: Vec<u8>) -> Result<HandoffEnd> {
        let this = &*self;
        let end = interact::splice(
            &this.reader,
            this.writer.clone(),
            &pending,
            DETACH_KEY,
            |cols, rows| {
                if let Err(e) = this.resize(cols, rows) {
                    debug!("PTY resize during handoff failed: {e}");
                }
            },
        )
        .await?;
        Ok(end)
    }

    fn release(&mut self) {
        self.release_child();
    }
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        self.release_child();
    }
}

impl std::fmt::Debug for PtyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyHandle")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PtyLauncher
// ---------------------------------------------------------------------------

/// Spawns gateway commands in a PTY sized like the operator's terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PtyLauncher;

impl PtyLauncher {
    fn current_size() -> PtySize {
        let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
        PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

impl Launcher for PtyLauncher {
    type Transport = PtyHandle;

    fn launch(&self, command: &GatewayCommand) -> Result<PtyHandle> {
        PtyHandle::spawn(command.program(), command.args(), Self::current_size())
    }
}
