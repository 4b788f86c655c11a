// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-spool: the directory-based spool tree and its lock protocol.
//!
//! This crate owns the filesystem side of the pipeline — folder layout,
//! atomic lock acquisition, and unit moves — and nothing about rules,
//! containers, or dispatch. Every other crate that touches the spool goes
//! through [`Spool`].

pub mod error;
pub mod spool;

pub use error::SpoolError;
pub use spool::{Spool, UnitLock};
