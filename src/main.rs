// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use courier::audit::AuditLog;
use courier::config::Config;
use courier::constants::audit::LOG_FILE;
use courier::constants::inventory::{DEVICES_FILE, SNAPSHOT_FILE};
use courier::inventory::{FileConfigStore, FileRegistry};
use courier::server::{self, App, TlsSettings};
use courier::sync::{SyncEngine, SyncSettings};
use courier::tls::BundlePaths;
use courier::transport::SftpTransport;
use courier::vault::CredentialVault;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Courier");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: data_dir={:?}, tls_cert_dir={:?}, username={}",
        config.data_dir, config.tls_cert_dir, config.ssh_username
    );

    let audit = Arc::new(
        AuditLog::open(&config.data_dir.join(LOG_FILE)).context("Failed to open audit log")?,
    );
    let vault = Arc::new(CredentialVault::new(
        &config.data_dir,
        config.ssh_keys_secret.clone(),
    ));
    let store = Arc::new(
        FileConfigStore::open(&config.data_dir.join(SNAPSHOT_FILE))
            .await
            .context("Failed to load configuration snapshot")?,
    );
    let registry = Arc::new(FileRegistry::new(&config.data_dir.join(DEVICES_FILE)));
    let transport = Arc::new(SftpTransport::new(config.connect_timeout));

    let engine = SyncEngine::new(
        vault.clone(),
        audit.clone(),
        registry,
        store.clone(),
        transport,
        SyncSettings::from(&config),
    );
    let app = App::new(
        engine,
        store,
        vault,
        audit,
        TlsSettings {
            paths: BundlePaths::new(&config.tls_cert_dir),
            passphrase: config.tls_passphrase.clone(),
            addr: config.https_addr,
        },
    );

    // HTTPS only comes up once a bundle exists; uploads start it later
    if app.tls.has_material() {
        if let Err(e) = app.tls.reload().await {
            warn!("HTTPS disabled: {}", e);
        }
    } else {
        warn!(
            "No TLS bundle in {:?}, HTTPS disabled until one is uploaded",
            config.tls_cert_dir
        );
    }

    server::serve_http(app.clone(), config.http_addr, shutdown_signal()).await?;

    app.tls.shutdown().await;
    info!("Courier stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
