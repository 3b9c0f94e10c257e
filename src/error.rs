// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CourierError {
    #[error("No SSH private key has been uploaded")]
    CredentialUnavailable,

    #[error("Vault key material is unusable: {0}")]
    KeyMaterial(String),

    #[error("Encrypted blob failed authentication (tampered or corrupt)")]
    TamperedOrCorrupt,

    #[error("Endpoint unreachable: {0}")]
    EndpointUnreachable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Remote read failed: {0}")]
    RemoteReadFailed(String),

    #[error("Remote write failed: {0}")]
    RemoteWriteFailed(String),

    #[error("No source endpoint was reachable")]
    NoSourceReachable,

    #[error("Empty upload: {0}")]
    EmptyUpload(String),

    #[error("Incomplete bundle: {0}")]
    IncompleteBundle(String),

    #[error("No usable certificate material found")]
    NoCertificateMaterial,

    #[error("Invalid certificate material: {0}")]
    InvalidCertificate(String),

    #[error("Invalid config entry {0}")]
    InvalidEntry(String),

    #[error("Listener error: {0}")]
    Listener(String),

    #[error("Configuration store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CourierError {
    /// Whether the error is confined to a single endpoint and the run may continue.
    pub fn is_per_endpoint(&self) -> bool {
        matches!(
            self,
            CourierError::EndpointUnreachable(_)
                | CourierError::AuthenticationFailed(_)
                | CourierError::RemoteReadFailed(_)
                | CourierError::RemoteWriteFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CourierError>;
