// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Image signature verification: runs a containerized signature
//! verification step with the configured `certificate_identity` and
//! `certificate_oidc_issuer`. Failure aborts the task.

use crate::error::AdapterError;
use crate::runtime::{ContainerRuntime, ContainerSpec};
use async_trait::async_trait;
use std::time::Duration;

const VERIFY_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(
        &self,
        image: &str,
        certificate_identity: &str,
        certificate_oidc_issuer: &str,
    ) -> Result<(), AdapterError>;
}

/// Runs a `cosign`-style verifier container against the image.
pub struct CosignVerifier<R: ContainerRuntime> {
    runtime: R,
    verifier_image: String,
}

impl<R: ContainerRuntime> CosignVerifier<R> {
    pub fn new(runtime: R, verifier_image: impl Into<String>) -> Self {
        CosignVerifier { runtime, verifier_image: verifier_image.into() }
    }
}

#[async_trait]
impl<R: ContainerRuntime> SignatureVerifier for CosignVerifier<R> {
    async fn verify(
        &self,
        image: &str,
        certificate_identity: &str,
        certificate_oidc_issuer: &str,
    ) -> Result<(), AdapterError> {
        let spec = ContainerSpec {
            image: self.verifier_image.clone(),
            command: Some(vec![
                "verify".to_string(),
                image.to_string(),
                "--certificate-identity".to_string(),
                certificate_identity.to_string(),
                "--certificate-oidc-issuer".to_string(),
                certificate_oidc_issuer.to_string(),
            ]),
            environment: Default::default(),
            mounts: vec![],
            security: crate::security::SecurityPolicy::locked_down(0, 0),
            network_mode: relay_core::NetworkMode::Bridge,
            timeout: VERIFY_TIMEOUT,
        };

        let outcome = self.runtime.run(&spec).await?;
        if !outcome.succeeded() {
            return Err(AdapterError::SignatureVerificationFailed {
                image: image.to_string(),
                reason: outcome.logs,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
