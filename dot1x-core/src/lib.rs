pub mod auth_session;
pub mod config;

use std::fmt;

pub use auth_session::{AuthSession, AuthState};
pub use config::{Config, LogLevel};

/// Outcome of one authentication run over every device seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Pass,
    Fail,
    /// No device completed authentication.
    Skip,
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TestResult::Pass => "pass",
            TestResult::Fail => "fail",
            TestResult::Skip => "skip",
        })
    }
}
