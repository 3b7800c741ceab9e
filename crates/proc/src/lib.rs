// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess supervision for external scanning tools.
//!
//! Spawns command lines tokenized under POSIX quoting rules, streams
//! line-oriented output to callbacks, and honors cooperative pause/stop
//! plus a hard per-process timeout.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod run;
mod tokens;

pub use run::{LineSink, RunError, RunOutcome, RunOutput, RunRequest, Supervisor};
pub use run::{KILL_GRACE, PAUSE_POLL};
pub use tokens::{split, TokenizeError};

/// Truncate a string to at most `n` bytes on a char boundary, for logging.
pub fn truncate(s: &str, n: usize) -> &str {
    if s.len() <= n {
        return s;
    }
    let mut end = n;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
