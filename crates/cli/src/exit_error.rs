// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.

use std::fmt;

use agnt_client::ClientError;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<ClientError> for ExitError {
    fn from(e: ClientError) -> Self {
        Self::new(e.exit_code(), e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        not_running = { ClientError::NotRunning, 4 },
        version_mismatch = { ClientError::VersionMismatch("daemon speaks 1".into()), 5 },
        cancelled = { ClientError::Cancelled, 10 },
    )]
    fn client_errors_carry_their_exit_codes(error: ClientError, code: i32) {
        let err: ExitError = error.into();
        assert_eq!(err.code, code);
    }

    #[test]
    fn usage_helper_is_exit_two() {
        assert_eq!(ExitError::usage("bad flag").code, 2);
    }
}
