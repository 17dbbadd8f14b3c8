// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request and reply message shapes.
//!
//! A request is `VERB [SUB] [args...] ;;`. Whether the second field is a
//! sub-verb is decided by the verb registry, not the parser, so a request
//! carries `verb` plus raw decoded args. Replies are `OK ...`, `ERR <kind>
//! [message]`, or `EVENT <kind> ...`. Empty args are not representable on
//! the wire; senders use a `-` placeholder where a slot must be filled.

use agnt_core::ErrorKind;
use thiserror::Error;

use crate::escape::{decode_field, encode_field};

/// Terminator for every message line.
pub const TERMINATOR: &str = ";;";

/// Errors from codec and framing.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out")]
    Timeout,

    #[error("line exceeds {0} bytes")]
    Oversized(usize),

    #[error("missing `;;` terminator: {0:?}")]
    MissingTerminator(String),

    #[error("empty message")]
    Empty,

    #[error("invalid verb: {0:?}")]
    BadVerb(String),

    #[error("bad percent escape: {0:?}")]
    BadEscape(String),

    #[error("malformed reply: {0:?}")]
    BadReply(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

fn is_verb_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_uppercase() || b == b'_')
}

fn split_line(line: &str) -> Result<Vec<&str>, WireError> {
    let trimmed = line.trim_end_matches(['\r', '\n']).trim_end();
    let Some(body) = trimmed.strip_suffix(TERMINATOR) else {
        return Err(WireError::MissingTerminator(trimmed.to_string()));
    };
    Ok(body.split_ascii_whitespace().collect())
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Uppercase verb.
    pub verb: String,
    /// Decoded positional fields after the verb (a sub-verb, when the verb
    /// takes one, is `args[0]`).
    pub args: Vec<String>,
}

impl Request {
    pub fn new(verb: impl Into<String>, args: Vec<String>) -> Self {
        Self { verb: verb.into(), args }
    }

    /// Parse one line into a request.
    pub fn parse(line: &str) -> Result<Self, WireError> {
        let fields = split_line(line)?;
        let Some((&verb, rest)) = fields.split_first() else {
            return Err(WireError::Empty);
        };
        if !is_verb_token(verb) {
            return Err(WireError::BadVerb(verb.to_string()));
        }
        let args =
            rest.iter().map(|f| decode_field(f)).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { verb: verb.to_string(), args })
    }

    /// Encode to a wire line (terminator included, no trailing newline).
    pub fn encode(&self) -> String {
        let mut line = self.verb.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&encode_field(arg));
        }
        line.push(' ');
        line.push_str(TERMINATOR);
        line
    }
}

/// A decoded server reply or pushed event.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok(Vec<String>),
    Err { kind: ErrorKind, message: String },
    Event { kind: String, args: Vec<String> },
}

impl Reply {
    pub fn ok(args: impl IntoIterator<Item = String>) -> Self {
        Reply::Ok(args.into_iter().collect())
    }

    pub fn err(kind: ErrorKind, message: impl Into<String>) -> Self {
        Reply::Err { kind, message: message.into() }
    }

    pub fn event(kind: impl Into<String>, args: Vec<String>) -> Self {
        Reply::Event { kind: kind.into(), args }
    }

    /// Terminal replies complete a request; events are pushed in between.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Reply::Event { .. })
    }

    pub fn parse(line: &str) -> Result<Self, WireError> {
        let fields = split_line(line)?;
        let Some((&head, rest)) = fields.split_first() else {
            return Err(WireError::Empty);
        };
        match head {
            "OK" => {
                let args =
                    rest.iter().map(|f| decode_field(f)).collect::<Result<Vec<_>, _>>()?;
                Ok(Reply::Ok(args))
            }
            "ERR" => {
                let Some((&kind, msg)) = rest.split_first() else {
                    return Err(WireError::BadReply(line.to_string()));
                };
                let kind: ErrorKind =
                    kind.parse().map_err(|_| WireError::BadReply(line.to_string()))?;
                let message = match msg.first() {
                    Some(m) => decode_field(m)?,
                    None => String::new(),
                };
                Ok(Reply::Err { kind, message })
            }
            "EVENT" => {
                let Some((&kind, args)) = rest.split_first() else {
                    return Err(WireError::BadReply(line.to_string()));
                };
                let args =
                    args.iter().map(|f| decode_field(f)).collect::<Result<Vec<_>, _>>()?;
                Ok(Reply::Event { kind: kind.to_string(), args })
            }
            other => Err(WireError::BadReply(other.to_string())),
        }
    }

    pub fn encode(&self) -> String {
        let mut line = String::new();
        match self {
            Reply::Ok(args) => {
                line.push_str("OK");
                for arg in args {
                    line.push(' ');
                    line.push_str(&encode_field(arg));
                }
            }
            Reply::Err { kind, message } => {
                line.push_str("ERR ");
                line.push_str(kind.as_str());
                if !message.is_empty() {
                    line.push(' ');
                    line.push_str(&encode_field(message));
                }
            }
            Reply::Event { kind, args } => {
                line.push_str("EVENT ");
                line.push_str(kind);
                for arg in args {
                    line.push(' ');
                    line.push_str(&encode_field(arg));
                }
            }
        }
        line.push(' ');
        line.push_str(TERMINATOR);
        line
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
