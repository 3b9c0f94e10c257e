// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HTTP API, served over plain HTTP and over the hot-swappable HTTPS listener.

pub mod error;
pub mod routes;

use async_trait::async_trait;
use axum::routing::{delete, get, post};
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::audit::AuditLog;
use crate::constants::server::MAX_BODY_BYTES;
use crate::error::{CourierError, Result};
use crate::inventory::ConfigStore;
use crate::sync::SyncEngine;
use crate::tls::{BundlePaths, ConnectionHandler, TlsManager};
use crate::vault::CredentialVault;

/// Shared service state behind every route
pub struct App {
    pub engine: SyncEngine,
    pub store: Arc<dyn ConfigStore>,
    pub vault: Arc<CredentialVault>,
    pub audit: Arc<AuditLog>,
    pub tls: TlsManager,
    me: Weak<App>,
}

/// Where the HTTPS listener finds its material and binds
pub struct TlsSettings {
    pub paths: BundlePaths,
    pub passphrase: Option<String>,
    pub addr: SocketAddr,
}

impl App {
    /// The TLS manager hands accepted connections back to the app, so the two
    /// are built together with the manager holding only a weak reference.
    pub fn new(
        engine: SyncEngine,
        store: Arc<dyn ConfigStore>,
        vault: Arc<CredentialVault>,
        audit: Arc<AuditLog>,
        tls: TlsSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<App>| {
            let handler: Weak<dyn ConnectionHandler> = me.clone();
            let manager = TlsManager::new(
                tls.paths,
                tls.passphrase,
                tls.addr,
                audit.clone(),
                handler,
            );
            App {
                engine,
                store,
                vault,
                audit,
                tls: manager,
                me: me.clone(),
            }
        })
    }
}

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/api/ops/logs", get(routes::list_logs))
        .route("/api/ops/get-config", post(routes::get_config))
        .route("/api/ops/commit-config", post(routes::commit_config))
        .route(
            "/api/config",
            get(routes::show_config).put(routes::replace_config),
        )
        .route("/api/tls/status", get(routes::tls_status))
        .route("/api/tls/reload", post(routes::tls_reload))
        .route("/api/tls/upload/pfx", post(routes::upload_pfx))
        .route("/api/tls/upload/pem", post(routes::upload_pem))
        .route("/api/ssh-keys", delete(routes::remove_ssh_keys))
        .route("/api/ssh-keys/status", get(routes::ssh_key_status))
        .route("/api/ssh-keys/upload", post(routes::upload_ssh_keys))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(app)
}

#[async_trait]
impl ConnectionHandler for App {
    async fn serve(&self, stream: TlsStream<TcpStream>, peer: SocketAddr) {
        let Some(app) = self.me.upgrade() else {
            return;
        };
        let service = TowerToHyperService::new(router(app));

        if let Err(e) = auto::Builder::new(TokioExecutor::new())
            .serve_connection(TokioIo::new(stream), service)
            .await
        {
            debug!("HTTPS connection from {} ended: {}", peer, e);
        }
    }
}

/// Serve the API over plain HTTP until `shutdown` resolves.
pub async fn serve_http<F>(app: Arc<App>, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| CourierError::Listener(format!("Failed to bind {}: {}", addr, e)))?;
    info!("HTTP listening on {}", listener.local_addr()?);

    axum::serve(listener, router(app))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
