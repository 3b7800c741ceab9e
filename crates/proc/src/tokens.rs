// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! POSIX-style command tokenization.
//!
//! Splits a command line into argv tokens under shell quoting rules:
//! single quotes are literal, double quotes honor backslash escapes for
//! `"` `\` `$` and backtick, and a backslash outside quotes escapes the
//! next character. Nothing is ever expanded — no variables, no globs, no
//! substitution. Callers pass pre-validated strings.

use thiserror::Error;

/// Errors from tokenizing a command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("unterminated single quote")]
    UnterminatedSingleQuote,
    #[error("unterminated double quote")]
    UnterminatedDoubleQuote,
    #[error("trailing backslash")]
    TrailingBackslash,
    #[error("empty command")]
    Empty,
}

#[derive(PartialEq)]
enum State {
    Unquoted,
    SingleQuoted,
    DoubleQuoted,
}

/// Split a command line into tokens.
///
/// Returns at least one token; an empty or all-whitespace input is an
/// error so callers cannot accidentally exec nothing.
pub fn split(input: &str) -> Result<Vec<String>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // Distinguishes `''` (an empty token) from no token at all.
    let mut has_token = false;
    let mut state = State::Unquoted;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match state {
            State::Unquoted => match ch {
                c if c.is_whitespace() => {
                    if has_token {
                        tokens.push(std::mem::take(&mut current));
                        has_token = false;
                    }
                }
                '\'' => {
                    state = State::SingleQuoted;
                    has_token = true;
                }
                '"' => {
                    state = State::DoubleQuoted;
                    has_token = true;
                }
                '\\' => {
                    let next = chars.next().ok_or(TokenizeError::TrailingBackslash)?;
                    current.push(next);
                    has_token = true;
                }
                c => {
                    current.push(c);
                    has_token = true;
                }
            },
            State::SingleQuoted => match ch {
                '\'' => state = State::Unquoted,
                c => current.push(c),
            },
            State::DoubleQuoted => match ch {
                '"' => state = State::Unquoted,
                '\\' => {
                    let next = chars.next().ok_or(TokenizeError::UnterminatedDoubleQuote)?;
                    match next {
                        '"' | '\\' | '$' | '`' => current.push(next),
                        c => {
                            // POSIX keeps the backslash before anything else
                            current.push('\\');
                            current.push(c);
                        }
                    }
                }
                c => current.push(c),
            },
        }
    }

    match state {
        State::SingleQuoted => return Err(TokenizeError::UnterminatedSingleQuote),
        State::DoubleQuoted => return Err(TokenizeError::UnterminatedDoubleQuote),
        State::Unquoted => {}
    }

    if has_token {
        tokens.push(current);
    }

    if tokens.is_empty() {
        return Err(TokenizeError::Empty);
    }

    Ok(tokens)
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
