//! Operator-facing terminal I/O.
//!
//! Everything the menu, credential prompts and orchestrator print or read
//! goes through [`Console`], so the whole interactive loop can be driven
//! from a script in tests.
//!
//! Reads report end of input as `Ok(None)` (or `UnexpectedEof` for the
//! secret) and an operator interrupt as `io::ErrorKind::Interrupted`.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use hop_session::interrupt::Interrupt;
use tracing::debug;
use zeroize::Zeroizing;

#[async_trait]
pub trait Console: Send {
    /// Print one line.
    fn say(&mut self, line: &str);

    /// Show `prompt` and read one line without its terminator.
    async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Show `prompt` and read a line with echo disabled.
    async fn read_secret(&mut self, prompt: &str) -> io::Result<Zeroizing<String>>;
}

pub(crate) fn interrupted() -> io::Error {
    io::Error::from(io::ErrorKind::Interrupted)
}

// ---------------------------------------------------------------------------
// Echo control
// ---------------------------------------------------------------------------

/// Turns terminal echo off on stdin until dropped.
///
/// Only `ECHO` is cleared. The line discipline stays canonical, so Enter
/// still ends the line, Ctrl+C still raises SIGINT and a read returns at
/// most one line, leaving type-ahead queued for the next prompt.
struct EchoOff {
    saved: libc::termios,
}

impl EchoOff {
    /// `Ok(None)` when stdin is not a terminal.
    fn stdin() -> io::Result<Option<Self>> {
        // SAFETY: an all-zero termios is a valid value to pass to tcgetattr.
        let mut saved: libc::termios = unsafe { std::mem::zeroed() };
        // SAFETY: `saved` is a valid, writable termios.
        if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &mut saved) } != 0 {
            let err = io::Error::last_os_error();
            debug!("stdin is not a terminal, reading secret as-is: {err}");
            return Ok(None);
        }

        let mut quiet = saved;
        quiet.c_lflag &= !libc::ECHO;
        // TCSANOW keeps anything already typed.
        // SAFETY: `quiet` is a valid termios derived from the current one.
        if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &quiet) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Some(Self { saved }))
    }
}

impl Drop for EchoOff {
    fn drop(&mut self) {
        // SAFETY: `saved` came from tcgetattr on the same descriptor.
        if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.saved) } != 0 {
            debug!(
                "failed to restore terminal echo: {}",
                io::Error::last_os_error()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// StdConsole
// ---------------------------------------------------------------------------

/// The real terminal.
///
/// Both kinds of read go through the process-wide stdin reader on the
/// blocking pool and race the interrupt listener. A read abandoned that way
/// keeps its thread until the runtime is shut down, which is fine because
/// every interrupt at a prompt ends the program.
pub struct StdConsole {
    interrupt: Interrupt,
}

impl StdConsole {
    pub fn new(interrupt: Interrupt) -> Self {
        Self { interrupt }
    }

    async fn next_line(&mut self) -> io::Result<Option<Zeroizing<String>>> {
        let mut interrupt = self.interrupt.clone();
        interrupt.clear();

        let read = tokio::task::spawn_blocking(|| {
            let mut line = Zeroizing::new(String::new());
            let n = io::stdin().lock().read_line(&mut line)?;
            Ok::<_, io::Error>((n, line))
        });

        tokio::select! {
            biased;
            _ = interrupt.triggered() => Err(interrupted()),
            joined = read => {
                let (n, mut line) = joined.map_err(io::Error::other)??;
                if n == 0 {
                    return Ok(None);
                }
                let keep = line.trim_end_matches(['\r', '\n']).len();
                line.truncate(keep);
                Ok(Some(line))
            }
        }
    }
}

fn show_prompt(prompt: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()
}

#[async_trait]
impl Console for StdConsole {
    fn say(&mut self, line: &str) {
        println!("{line}");
    }

    async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        show_prompt(prompt)?;
        let line = self.next_line().await?;
        Ok(line.map(|l| l.as_str().to_owned()))
    }

    async fn read_secret(&mut self, prompt: &str) -> io::Result<Zeroizing<String>> {
        // Echo goes off before the prompt shows, so nothing typed in
        // response to it is ever echoed.
        let echo = EchoOff::stdin()?;
        show_prompt(prompt)?;
        let line = self.next_line().await;
        drop(echo);
        println!();
        line?.ok_or_else(|| io::ErrorKind::UnexpectedEof.into())
    }
}

// ---------------------------------------------------------------------------
// Scripted console for tests
// ---------------------------------------------------------------------------
