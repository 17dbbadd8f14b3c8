// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verb registry: `verb -> {allowed sub-verbs, handler}`.
//!
//! Registration is dynamic so agnt-specific verbs layer onto a reusable
//! hub core. Resolution validates the sub-verb before the handler is ever
//! invoked; unknown verbs and sub-verbs fail with stable error kinds.

use std::collections::HashMap;

use agnt_core::ErrorKind;
use thiserror::Error;

use crate::message::Request;

struct VerbEntry<H> {
    subverbs: Vec<&'static str>,
    handler: H,
}

/// Resolution failure, carrying the wire error kind to surface.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown verb: {0}")]
    UnknownVerb(String),

    #[error("unknown sub-verb for {verb}: {got}")]
    UnknownSubVerb { verb: String, got: String },

    #[error("{verb} requires a sub-verb")]
    MissingSubVerb { verb: String },

    #[error("verb already registered: {0}")]
    Duplicate(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::UnknownVerb(_) => ErrorKind::NotFound,
            RegistryError::UnknownSubVerb { .. } => ErrorKind::NotFound,
            RegistryError::MissingSubVerb { .. } => ErrorKind::Usage,
            RegistryError::Duplicate(_) => ErrorKind::AlreadyExists,
        }
    }
}

/// A resolved dispatch: the handler plus the split sub-verb/args view.
pub struct Dispatch<'a, H> {
    pub handler: &'a H,
    pub subverb: Option<&'a str>,
    pub args: &'a [String],
}

/// Dynamic verb table.
pub struct Registry<H> {
    verbs: HashMap<&'static str, VerbEntry<H>>,
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self { verbs: HashMap::new() }
    }
}

impl<H> Registry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a verb. `subverbs` empty means the verb takes none.
    pub fn register(
        &mut self,
        verb: &'static str,
        subverbs: &[&'static str],
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.verbs.contains_key(verb) {
            return Err(RegistryError::Duplicate(verb.to_string()));
        }
        self.verbs.insert(verb, VerbEntry { subverbs: subverbs.to_vec(), handler });
        Ok(())
    }

    pub fn contains(&self, verb: &str) -> bool {
        self.verbs.contains_key(verb)
    }

    /// Registered verbs, sorted, for diagnostics.
    pub fn verbs(&self) -> Vec<&'static str> {
        let mut out: Vec<_> = self.verbs.keys().copied().collect();
        out.sort_unstable();
        out
    }

    /// Resolve a request to its handler, validating the sub-verb.
    pub fn resolve<'a>(&'a self, request: &'a Request) -> Result<Dispatch<'a, H>, RegistryError> {
        let entry = self
            .verbs
            .get(request.verb.as_str())
            .ok_or_else(|| RegistryError::UnknownVerb(request.verb.clone()))?;

        if entry.subverbs.is_empty() {
            return Ok(Dispatch { handler: &entry.handler, subverb: None, args: &request.args });
        }

        let Some(sub) = request.args.first() else {
            return Err(RegistryError::MissingSubVerb { verb: request.verb.clone() });
        };
        if !entry.subverbs.iter().any(|s| *s == sub) {
            return Err(RegistryError::UnknownSubVerb {
                verb: request.verb.clone(),
                got: sub.clone(),
            });
        }
        Ok(Dispatch {
            handler: &entry.handler,
            subverb: Some(sub.as_str()),
            args: &request.args[1..],
        })
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
