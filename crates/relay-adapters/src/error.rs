// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to exec {runtime}: {source}")]
    Exec {
        runtime: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{runtime} command failed: {message}")]
    CommandFailed { runtime: &'static str, message: String },

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("signature verification failed for {image}: {reason}")]
    SignatureVerificationFailed { image: String, reason: String },

    #[error("bookkeeper request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bookkeeper returned an error status: {0}")]
    BookkeeperStatus(reqwest::StatusCode),

    #[error("unknown dispatch target: {0}")]
    UnknownTarget(String),
}
