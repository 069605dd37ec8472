//! Seams between the driver and the subordinate process.
//!
//! [`Launcher`] turns a [`GatewayCommand`] into a live [`Transport`]; the
//! production pair is [`crate::pty::PtyLauncher`] / [`crate::pty::PtyHandle`].

use std::time::Duration;

use async_trait::async_trait;

use crate::command::GatewayCommand;
use crate::error::Result;

/// What a bounded read of subordinate output produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    Data(Vec<u8>),
    TimedOut,
    Closed,
}

/// How an interactive handoff finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffEnd {
    /// The subordinate closed its output.
    SessionClosed,
    /// The operator pressed the detach key.
    Detached,
}

#[async_trait]
pub trait Transport: Send {
    /// Wait up to `timeout` for the next chunk of output.
    async fn read_chunk(&mut self, timeout: Duration) -> ReadEvent;

    /// Write `line` followed by a newline to the subordinate's input.
    fn send_line(&mut self, line: &[u8]) -> Result<()>;

    /// Splice the subordinate onto the operator's terminal until it closes
    /// or the operator detaches. `pending` is output already read but not
    /// yet shown.
    async fn hand_off(&mut self, pending: Vec<u8>) -> Result<HandoffEnd>;

    /// Terminate and reap the subordinate. Calling it again is a no-op.
    fn release(&mut self);
}

pub trait Launcher: Send + Sync {
    type Transport: Transport;

    fn launch(&self, command: &GatewayCommand) -> Result<Self::Transport>;
}
