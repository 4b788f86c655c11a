// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations, one module per `relayctl` subcommand.

pub mod delete;
pub mod force_complete;
pub mod restart;
pub mod status;
pub mod units;

use clap::ValueEnum;
use relay_core::Stage;

/// Mirrors [`Stage`] so it can derive [`ValueEnum`] without relay-core
/// taking a dependency on clap.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StageArg {
    Incoming,
    Studies,
    Patients,
    Processing,
    Outgoing,
    Success,
    Error,
    Discard,
    Jobs,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Stage {
        match arg {
            StageArg::Incoming => Stage::Incoming,
            StageArg::Studies => Stage::Studies,
            StageArg::Patients => Stage::Patients,
            StageArg::Processing => Stage::Processing,
            StageArg::Outgoing => Stage::Outgoing,
            StageArg::Success => Stage::Success,
            StageArg::Error => Stage::Error,
            StageArg::Discard => Stage::Discard,
            StageArg::Jobs => Stage::Jobs,
        }
    }
}
