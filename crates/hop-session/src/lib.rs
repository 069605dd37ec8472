//! Gateway session automation for gatehop.
//!
//! A [`driver::SessionDriver`] spawns `ssh` to the access gateway inside a
//! pseudo-terminal, answers the gateway's host-key, password and PIN prompts
//! from an ordered [`cue::CueTable`], and then splices the live session onto
//! the operator's terminal. The transitions are a pure table in
//! [`machine`], so the single PIN gate into interactive mode can be checked
//! without a process.
//!
//! Key components:
//! - Cue table and match buffer
//! - Driver state machine and outcomes
//! - PTY-backed transport and the interactive splice
//! - Interrupt listener shared with the CLI

pub mod command;
pub mod cue;
pub mod driver;
pub mod error;
pub mod interact;
pub mod interrupt;
pub mod machine;
pub mod pty;
pub mod transport;

pub use driver::SessionDriver;
pub use machine::{RejectReason, SessionOutcome};
