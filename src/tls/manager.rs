// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use super::bundle::{load_server_config, BundlePaths};
use super::listener::{ConnectionHandler, TlsListener};
use crate::audit::AuditLog;
use crate::constants::audit::kinds;
use crate::error::{CourierError, Result};
use crate::files::{ensure_dir, remove_if_exists, write_atomic};

/// Presence of each bundle file. Contents are not validated.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TlsStatus {
    #[serde(rename = "pfx")]
    pub combined_present: bool,
    #[serde(rename = "key")]
    pub key_present: bool,
    #[serde(rename = "crt")]
    pub cert_present: bool,
    #[serde(rename = "chain")]
    pub chain_present: bool,
}

/// Owns the certificate directory and the single running HTTPS listener.
///
/// The listener slot is guarded by an async mutex held for the whole reload.
pub struct TlsManager {
    paths: BundlePaths,
    passphrase: Option<String>,
    default_addr: SocketAddr,
    audit: Arc<AuditLog>,
    handler: Weak<dyn ConnectionHandler>,
    listener: Mutex<Option<TlsListener>>,
}

impl TlsManager {
    pub fn new(
        paths: BundlePaths,
        passphrase: Option<String>,
        default_addr: SocketAddr,
        audit: Arc<AuditLog>,
        handler: Weak<dyn ConnectionHandler>,
    ) -> Self {
        Self {
            paths,
            passphrase,
            default_addr,
            audit,
            handler,
            listener: Mutex::new(None),
        }
    }

    pub fn status(&self) -> TlsStatus {
        TlsStatus {
            combined_present: self.paths.combined().exists(),
            key_present: self.paths.key().exists(),
            cert_present: self.paths.cert().exists(),
            chain_present: self.paths.chain().exists(),
        }
    }

    /// Whether any loadable bundle form is on disk
    pub fn has_material(&self) -> bool {
        self.paths.locate().is_some()
    }

    /// Address of the running listener, if any
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().await.as_ref().map(TlsListener::local_addr)
    }

    /// Store a PKCS#12 archive and reload.
    #[instrument(skip(self, archive), fields(bytes = archive.len()))]
    pub async fn upload_combined(&self, archive: &[u8]) -> Result<SocketAddr> {
        if archive.is_empty() {
            return Err(CourierError::EmptyUpload("PKCS#12 archive".to_string()));
        }

        ensure_dir(self.paths.dir())?;
        write_atomic(&self.paths.combined(), archive)?;
        self.audit.info(kinds::TLS, "Combined TLS bundle uploaded");

        self.reload().await
    }

    /// Store a PEM key, certificate and optional chain, then reload.
    ///
    /// Nothing is written unless both key and certificate are present. Without a
    /// chain, any previously stored chain is removed.
    #[instrument(skip_all)]
    pub async fn upload_separate(
        &self,
        key: Option<&[u8]>,
        cert: Option<&[u8]>,
        chain: Option<&[u8]>,
    ) -> Result<SocketAddr> {
        let key = key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CourierError::IncompleteBundle("private key is missing".to_string()))?;
        let cert = cert
            .filter(|c| !c.is_empty())
            .ok_or_else(|| CourierError::IncompleteBundle("certificate is missing".to_string()))?;

        ensure_dir(self.paths.dir())?;
        write_atomic(&self.paths.key(), key)?;
        write_atomic(&self.paths.cert(), cert)?;
        match chain.filter(|c| !c.is_empty()) {
            Some(chain) => write_atomic(&self.paths.chain(), chain)?,
            None => remove_if_exists(&self.paths.chain())?,
        }
        self.audit.info(kinds::TLS, "PEM TLS bundle uploaded");

        self.reload().await
    }

    /// Rebuild the TLS config from disk and restart the listener on the same port.
    ///
    /// The new config is validated before the running listener is touched. The old
    /// listener is fully closed before the new one binds, leaving a short gap with no
    /// HTTPS listener. On failure after that point no listener is running.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<SocketAddr> {
        let mut slot = self.listener.lock().await;
        match self.swap(&mut slot).await {
            Ok(addr) => {
                self.audit
                    .info(kinds::TLS, &format!("TLS listener reloaded on {}", addr));
                Ok(addr)
            }
            Err(e) => {
                self.audit
                    .error(kinds::TLS, &format!("TLS reload failed: {}", e));
                Err(e)
            }
        }
    }

    async fn swap(&self, slot: &mut Option<TlsListener>) -> Result<SocketAddr> {
        let bundle = self
            .paths
            .locate()
            .ok_or(CourierError::NoCertificateMaterial)?;
        let config = Arc::new(load_server_config(&bundle, self.passphrase.as_deref())?);

        let addr = match slot.take() {
            Some(old) => {
                let addr = old.local_addr();
                old.stop().await;
                addr
            }
            None => self.default_addr,
        };

        let listener = TlsListener::bind(addr, config, self.handler.clone()).await?;
        let bound = listener.local_addr();
        *slot = Some(listener);
        Ok(bound)
    }

    /// Stop the listener, if one is running.
    pub async fn shutdown(&self) {
        if let Some(listener) = self.listener.lock().await.take() {
            listener.stop().await;
            info!("TLS manager shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Level;
    use crate::tls::bundle::testdata::*;
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_rustls::server::TlsStream;

    struct Greeter;

    #[async_trait]
    impl ConnectionHandler for Greeter {
        async fn serve(&self, mut stream: TlsStream<TcpStream>, _peer: SocketAddr) {
            let _ = stream.write_all(b"hello").await;
            let _ = stream.shutdown().await;
        }
    }

    struct Fixture {
        manager: TlsManager,
        audit: Arc<AuditLog>,
        paths: BundlePaths,
        _handler: Arc<dyn ConnectionHandler>,
        _dir: tempfile::TempDir,
    }

    fn fixture(passphrase: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let paths = BundlePaths::new(&dir.path().join("certs"));
        let audit = Arc::new(AuditLog::in_memory());
        let handler: Arc<dyn ConnectionHandler> = Arc::new(Greeter);
        let manager = TlsManager::new(
            paths.clone(),
            passphrase.map(str::to_string),
            "127.0.0.1:0".parse().unwrap(),
            audit.clone(),
            Arc::downgrade(&handler),
        );
        Fixture {
            manager,
            audit,
            paths,
            _handler: handler,
            _dir: dir,
        }
    }

    async fn greet(addr: SocketAddr) -> Vec<u8> {
        let mut roots = rustls::RootCertStore::empty();
        let mut pem = CERT_PEM;
        for cert in rustls_pemfile::certs(&mut pem) {
            roots.add(cert.unwrap()).unwrap();
        }
        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();

        let connector = tokio_rustls::TlsConnector::from(Arc::new(config));
        let tcp = TcpStream::connect(addr).await.unwrap();
        let name = rustls::pki_types::ServerName::try_from("localhost").unwrap();
        let mut tls = connector.connect(name, tcp).await.unwrap();

        let mut received = Vec::new();
        tls.read_to_end(&mut received).await.unwrap();
        received
    }

    #[tokio::test]
    async fn test_status_is_existence_only() {
        let f = fixture(None);
        assert_eq!(f.manager.status(), TlsStatus::default());

        std::fs::create_dir_all(f.paths.dir()).unwrap();
        std::fs::write(f.paths.key(), b"garbage").unwrap();
        std::fs::write(f.paths.chain(), b"garbage").unwrap();

        assert_eq!(
            f.manager.status(),
            TlsStatus {
                combined_present: false,
                key_present: true,
                cert_present: false,
                chain_present: true,
            }
        );
    }

    #[tokio::test]
    async fn test_upload_separate_without_cert_writes_nothing() {
        let f = fixture(None);

        let result = f
            .manager
            .upload_separate(Some(KEY_PEM), None, Some(CERT_PEM))
            .await;

        assert!(matches!(result, Err(CourierError::IncompleteBundle(_))));
        assert_eq!(f.manager.status(), TlsStatus::default());
        assert!(!f.paths.dir().exists());
        assert!(f.audit.list(10).is_empty());
    }

    #[tokio::test]
    async fn test_upload_separate_with_empty_key_writes_nothing() {
        let f = fixture(None);

        let result = f
            .manager
            .upload_separate(Some(b""), Some(CERT_PEM), None)
            .await;

        assert!(matches!(result, Err(CourierError::IncompleteBundle(_))));
        assert_eq!(f.manager.status(), TlsStatus::default());
    }

    #[tokio::test]
    async fn test_upload_combined_rejects_empty() {
        let f = fixture(None);

        let result = f.manager.upload_combined(b"").await;

        assert!(matches!(result, Err(CourierError::EmptyUpload(_))));
        assert!(!f.manager.status().combined_present);
    }

    #[tokio::test]
    async fn test_reload_without_material() {
        let f = fixture(None);

        let result = f.manager.reload().await;

        assert!(matches!(result, Err(CourierError::NoCertificateMaterial)));
        assert_eq!(f.manager.local_addr().await, None);
        assert_eq!(f.audit.list(1)[0].level, Level::Error);
    }

    #[tokio::test]
    async fn test_reload_twice_keeps_port_and_serves() {
        let f = fixture(None);
        let first = f
            .manager
            .upload_separate(Some(KEY_PEM), Some(CERT_PEM), None)
            .await
            .unwrap();
        assert_eq!(greet(first).await, b"hello");

        let second = f.manager.reload().await.unwrap();

        assert_eq!(second, first);
        assert_eq!(f.manager.local_addr().await, Some(first));
        assert_eq!(greet(second).await, b"hello");

        f.manager.shutdown().await;
        assert_eq!(f.manager.local_addr().await, None);
    }

    #[tokio::test]
    async fn test_upload_combined_serves_pkcs12() {
        let f = fixture(Some(PFX_PASSPHRASE));

        let addr = f.manager.upload_combined(PFX).await.unwrap();

        assert!(f.manager.status().combined_present);
        assert_eq!(greet(addr).await, b"hello");
        f.manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_upload_without_chain_removes_stale_chain() {
        let f = fixture(None);
        f.manager
            .upload_separate(Some(KEY_PEM), Some(CERT_PEM), Some(CERT_PEM))
            .await
            .unwrap();
        assert!(f.manager.status().chain_present);

        f.manager
            .upload_separate(Some(KEY_PEM), Some(CERT_PEM), None)
            .await
            .unwrap();

        assert!(!f.manager.status().chain_present);
        f.manager.shutdown().await;
    }
}
