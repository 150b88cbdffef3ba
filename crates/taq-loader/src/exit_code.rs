//! Process exit codes for `taq-import`
//!
//! A partially failed run exits 0 by default because the rows that did load
//! are committed; `--fail-on-partial` turns it into exit code 2.

use crate::report::RunStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every chunk loaded (or there was nothing to load)
    Success = 0,

    /// Fatal error before loading, or every chunk failed
    Failure = 1,

    /// Some chunks failed and `--fail-on-partial` was given
    PartialFailure = 2,
}

impl ExitCode {
    /// Exit code for a finished run
    pub fn for_status(status: RunStatus, fail_on_partial: bool) -> Self {
        match status {
            RunStatus::Succeeded => ExitCode::Success,
            RunStatus::PartiallyFailed if fail_on_partial => ExitCode::PartialFailure,
            RunStatus::PartiallyFailed => ExitCode::Success,
            RunStatus::Failed => ExitCode::Failure,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_policy() {
        assert_eq!(ExitCode::for_status(RunStatus::Succeeded, true), ExitCode::Success);
        assert_eq!(
            ExitCode::for_status(RunStatus::PartiallyFailed, false),
            ExitCode::Success
        );
        assert_eq!(
            ExitCode::for_status(RunStatus::PartiallyFailed, true),
            ExitCode::PartialFailure
        );
        assert_eq!(ExitCode::for_status(RunStatus::Failed, false), ExitCode::Failure);
        assert_eq!(ExitCode::PartialFailure.as_i32(), 2);
    }
}
