// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for daemon communication.
//!
//! Wire format: one message per line, space-separated percent-encoded
//! fields, terminated by `;;`. The first field is an uppercase verb;
//! responses start with `OK`, `ERR`, or `EVENT`.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod escape;
mod framing;
mod message;
mod registry;
mod verbs;

pub use escape::{decode_bytes, decode_field, encode_bytes, encode_field};
pub use framing::{read_line, write_line, MAX_LINE_BYTES};
pub use message::{Reply, Request, WireError};
pub use registry::{Dispatch, Registry, RegistryError};
pub use verbs::{subverbs_for, VERBS};
