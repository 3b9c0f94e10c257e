// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pull and push flows between the local snapshot and the remote fleet.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::constants::audit::kinds;
use crate::constants::sync::TMP_FILE_PREFIX;
use crate::error::{CourierError, Result};
use crate::inventory::{ConfigStore, EndpointRegistry};
use crate::transport::{RemoteSession, Transport};
use crate::types::{Endpoint, Role, Snapshot};
use crate::vault::CredentialVault;

/// Remote paths and identity used for every session
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub username: String,
    pub source_path: String,
    pub destination_path: String,
    pub remote_tmp_dir: String,
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self {
            username: config.ssh_username.clone(),
            source_path: config.source_path.clone(),
            destination_path: config.destination_path.clone(),
            remote_tmp_dir: config.remote_tmp_dir.clone(),
        }
    }
}

/// Result of a successful pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOutcome {
    /// Address of the source that answered
    pub source: String,
    pub parsed_count: usize,
}

/// Per-target outcome of a push. The push itself never fails on target errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

pub struct SyncEngine {
    vault: Arc<CredentialVault>,
    audit: Arc<AuditLog>,
    registry: Arc<dyn EndpointRegistry>,
    store: Arc<dyn ConfigStore>,
    transport: Arc<dyn Transport>,
    settings: SyncSettings,
}

impl SyncEngine {
    pub fn new(
        vault: Arc<CredentialVault>,
        audit: Arc<AuditLog>,
        registry: Arc<dyn EndpointRegistry>,
        store: Arc<dyn ConfigStore>,
        transport: Arc<dyn Transport>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            vault,
            audit,
            registry,
            store,
            transport,
            settings,
        }
    }

    /// Fetch the authoritative file from the first source that answers and
    /// replace the local snapshot with it.
    ///
    /// Sources are tried in registry order; iteration stops at the first success.
    /// If none answers, the local snapshot is left untouched.
    #[instrument(skip(self))]
    pub async fn fetch_from_first_available_source(&self) -> Result<PullOutcome> {
        self.ensure_credential(kinds::PULL)?;

        let sources = self.registry.list_endpoints(Role::Source).await?;
        info!("Pulling configuration, {} source(s) registered", sources.len());

        for endpoint in sources {
            let address = endpoint.address();
            match self.fetch_from(&endpoint).await {
                Ok(bytes) => {
                    self.audit
                        .info(kinds::PULL, &format!("Fetched config from {}", address));

                    let snapshot = Snapshot::parse(&String::from_utf8_lossy(&bytes));
                    let parsed_count = snapshot.len();
                    if let Err(e) = self.store.replace_snapshot(snapshot).await {
                        self.audit
                            .error(kinds::PULL, &format!("Failed storing config: {}", e));
                        return Err(e);
                    }

                    return Ok(PullOutcome {
                        source: address,
                        parsed_count,
                    });
                }
                Err(e) if e.is_per_endpoint() => {
                    self.audit.error(
                        kinds::PULL,
                        &format!("Failed fetching from {}: {}", address, e),
                    );
                }
                Err(e) => {
                    self.audit.error(
                        kinds::PULL,
                        &format!("Aborted pull at {}: {}", address, e),
                    );
                    return Err(e);
                }
            }
        }

        Err(CourierError::NoSourceReachable)
    }

    /// Write the local snapshot to every target, each through a temp file and a rename.
    ///
    /// A failing target is logged and skipped; the remaining targets are still attempted.
    #[instrument(skip(self))]
    pub async fn commit_to_all_targets(&self) -> Result<PushReport> {
        self.ensure_credential(kinds::PUSH)?;

        let targets = self.registry.list_endpoints(Role::Target).await?;
        let payload = self.store.snapshot().await?.serialize();
        info!(
            "Pushing {} bytes of configuration to {} target(s)",
            payload.len(),
            targets.len()
        );

        let mut report = PushReport::default();
        for endpoint in targets {
            let address = endpoint.address();
            match self.push_to(&endpoint, payload.as_bytes()).await {
                Ok(()) => {
                    self.audit
                        .info(kinds::PUSH, &format!("Pushed config to {}", address));
                    report.delivered.push(address);
                }
                Err(e) if e.is_per_endpoint() => {
                    self.audit.error(
                        kinds::PUSH,
                        &format!("Failed pushing to {}: {}", address, e),
                    );
                    report.failed.push(address);
                }
                Err(e) => {
                    self.audit.error(
                        kinds::PUSH,
                        &format!("Aborted push at {}: {}", address, e),
                    );
                    return Err(e);
                }
            }
        }

        info!(
            "Push finished: {} delivered, {} failed",
            report.delivered.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn ensure_credential(&self, kind: &str) -> Result<()> {
        if self.vault.has_private_key() {
            return Ok(());
        }
        self.audit.error(kind, "No SSH private key uploaded");
        Err(CourierError::CredentialUnavailable)
    }

    #[instrument(skip(self, endpoint), fields(endpoint = %endpoint.address()))]
    async fn fetch_from(&self, endpoint: &Endpoint) -> Result<Vec<u8>> {
        let mut session = self.open_session(endpoint).await?;
        let result = session.read_file(&self.settings.source_path).await;
        close_session(session, endpoint).await;
        result
    }

    #[instrument(skip(self, endpoint, payload), fields(endpoint = %endpoint.address()))]
    async fn push_to(&self, endpoint: &Endpoint, payload: &[u8]) -> Result<()> {
        let mut session = self.open_session(endpoint).await?;
        let tmp_path = self.temp_path();

        let result = match session.write_file(payload, &tmp_path).await {
            Ok(()) => {
                session
                    .rename(&tmp_path, &self.settings.destination_path)
                    .await
            }
            Err(e) => Err(e),
        };

        if result.is_err() {
            if let Err(e) = session.remove_file(&tmp_path).await {
                warn!(
                    "Failed to remove temp file {} on {}: {}",
                    tmp_path,
                    endpoint.address(),
                    e
                );
            }
        }

        close_session(session, endpoint).await;
        result
    }

    /// Decrypted key material is dropped (and zeroized) as soon as the session is open.
    async fn open_session(&self, endpoint: &Endpoint) -> Result<Box<dyn RemoteSession>> {
        let private_key = self.vault.load_private_key()?;
        self.transport
            .connect(endpoint, &self.settings.username, &private_key)
            .await
    }

    /// Unique per attempt
    fn temp_path(&self) -> String {
        format!(
            "{}/{}.{}-{}",
            self.settings.remote_tmp_dir.trim_end_matches('/'),
            TMP_FILE_PREFIX,
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        )
    }
}

async fn close_session(session: Box<dyn RemoteSession>, endpoint: &Endpoint) {
    if let Err(e) = session.close().await {
        warn!("Failed to close session to {}: {}", endpoint.address(), e);
    }
}
