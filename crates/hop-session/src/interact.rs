//! The interactive handoff: operator keystrokes go straight to the
//! subordinate and its output goes straight to the terminal.
//!
//! Nothing here looks at the bytes except for the detach key on the input
//! side. The terminal is in raw mode for the duration and is restored on
//! every exit path by [`RawModeGuard`].

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{debug, warn};

use crate::transport::HandoffEnd;

/// `Ctrl+]`, the same escape `telnet` uses.
pub const DETACH_KEY: u8 = 0x1d;

const STDIN_POLL_MS: libc::c_int = 100;
const RESIZE_POLL: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Raw mode
// ---------------------------------------------------------------------------

/// Holds the terminal in raw mode until dropped.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("failed to restore terminal mode: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Stdin pump
// ---------------------------------------------------------------------------

/// Forwards operator input to the subordinate from a dedicated thread.
///
/// The thread polls stdin with a short timeout so it can notice `stop` and
/// exit; dropping the pump joins it, so no stray reader is left to steal
/// keystrokes from the next menu prompt.
struct StdinPump {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl StdinPump {
    fn start(input: flume::Sender<Vec<u8>>, detach: flume::Sender<()>, detach_key: u8) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = std::thread::spawn(move || {
            let mut buf = [0u8; 1024];
            while !flag.load(Ordering::Relaxed) {
                match poll_stdin(STDIN_POLL_MS) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!("stdin poll failed: {e}");
                        let _ = detach.send(());
                        break;
                    }
                }

                let n = match read_stdin(&mut buf) {
                    Ok(0) | Err(_) => {
                        let _ = detach.send(());
                        break;
                    }
                    Ok(n) => n,
                };

                let (forward, detached) = split_at_detach(&buf[..n], detach_key);
                if !forward.is_empty() && input.send(forward.to_vec()).is_err() {
                    break;
                }
                if detached {
                    let _ = detach.send(());
                    break;
                }
            }
        });

        Self {
            stop,
            thread: Some(thread),
        }
    }
}

impl Drop for StdinPump {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn poll_stdin(timeout_ms: libc::c_int) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: `pfd` is a valid, initialised pollfd and we pass a count of 1.
    let ready = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if ready < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ready > 0)
}

/// Unbuffered read straight from fd 0. `std::io::stdin()` would buffer
/// bytes where `poll` cannot see them.
fn read_stdin(buf: &mut [u8]) -> io::Result<usize> {
    // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
    let n = unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

/// Bytes to forward, and whether the detach key was pressed. Input after
/// the detach key is dropped.
pub fn split_at_detach(chunk: &[u8], detach_key: u8) -> (&[u8], bool) {
    match chunk.iter().position(|&b| b == detach_key) {
        Some(pos) => (&chunk[..pos], true),
        None => (chunk, false),
    }
}

// ---------------------------------------------------------------------------
// Splice
// ---------------------------------------------------------------------------

/// Connect the subordinate to the operator's terminal until its output
/// closes or the operator presses `detach_key`.
///
/// `on_resize` is called with `(cols, rows)` whenever the terminal size
/// changes.
pub async fn splice<F>(
    output: &flume::Receiver<Vec<u8>>,
    input: flume::Sender<Vec<u8>>,
    pending: &[u8],
    detach_key: u8,
    mut on_resize: F,
) -> io::Result<HandoffEnd>
where
    F: FnMut(u16, u16),
{
    let mut stdout = io::stdout();
    let rule = "=".repeat(50);
    write!(
        stdout,
        "\n{rule}\nSESSION ESTABLISHED\nPress Ctrl+] to detach\n{rule}\n\n"
    )?;
    stdout.write_all(pending)?;
    stdout.flush()?;

    let _raw = RawModeGuard::enter()?;
    let (detach_tx, detach_rx) = flume::bounded::<()>(1);
    let _pump = StdinPump::start(input, detach_tx, detach_key);

    let mut size = crossterm::terminal::size().ok();
    let mut resize_tick = tokio::time::interval(RESIZE_POLL);

    let end = loop {
        tokio::select! {
            chunk = output.recv_async() => match chunk {
                Ok(bytes) => {
                    stdout.write_all(&bytes)?;
                    stdout.flush()?;
                }
                Err(_) => break HandoffEnd::SessionClosed,
            },
            _ = detach_rx.recv_async() => break HandoffEnd::Detached,
            _ = resize_tick.tick() => {
                if let Ok(now) = crossterm::terminal::size() {
                    if size != Some(now) {
                        size = Some(now);
                        on_resize(now.0, now.1);
                    }
                }
            }
        }
    };

    debug!(?end, "handoff finished");
    Ok(end)
}
