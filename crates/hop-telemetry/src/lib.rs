//! Logging setup shared by the gatehop binaries.
//!
//! All output goes to stderr: stdout belongs to the operator's terminal and,
//! once a session is handed off, to the spliced remote shell.

pub mod logging;
