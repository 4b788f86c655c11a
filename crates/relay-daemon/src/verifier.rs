// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wraps [`SignatureVerifier`] the same way [`crate::runtime_select::Runtime`]
//! wraps [`ContainerRuntime`]: one concrete type for the wiring to carry,
//! chosen once at startup from whether a verifier image is configured.

use crate::runtime_select::Runtime;
use async_trait::async_trait;
use relay_adapters::{AdapterError, CosignVerifier, SignatureVerifier};

#[derive(Clone)]
pub enum Verifier {
    Cosign(std::sync::Arc<CosignVerifier<Runtime>>),
    /// No `signature_verifier_image` configured: every image passes
    /// unverified. Appropriate for development spools only.
    None,
}

impl Verifier {
    pub fn new(runtime: Runtime, verifier_image: Option<String>) -> Self {
        match verifier_image {
            Some(image) => Verifier::Cosign(std::sync::Arc::new(CosignVerifier::new(runtime, image))),
            None => Verifier::None,
        }
    }
}

#[async_trait]
impl SignatureVerifier for Verifier {
    async fn verify(&self, image: &str, certificate_identity: &str, certificate_oidc_issuer: &str) -> Result<(), AdapterError> {
        match self {
            Verifier::Cosign(verifier) => verifier.verify(image, certificate_identity, certificate_oidc_issuer).await,
            Verifier::None => Ok(()),
        }
    }
}
