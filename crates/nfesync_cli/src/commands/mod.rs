//! CLI command implementations.
//!
//! Commands write their report to the given output and return a
//! [`Status`]; `main` turns the worst status into the exit code.

pub mod cooldown;
pub mod pending;
pub mod relocate;
pub mod sync;
pub mod sync_all;

use std::process::ExitCode;

/// How a command ended, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    /// Completed successfully.
    Success,
    /// The feed is in cooldown; nothing was fetched.
    Blocked,
    /// The Authority rejected the request.
    Rejected,
}

impl Status {
    /// Process exit code.
    pub fn exit_code(self) -> ExitCode {
        match self {
            Status::Success => ExitCode::SUCCESS,
            Status::Rejected => ExitCode::from(1),
            Status::Blocked => ExitCode::from(2),
        }
    }
}
