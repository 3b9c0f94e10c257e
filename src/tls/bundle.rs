// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Certificate bundle discovery and conversion into a rustls server config.

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::constants::tls::{CERT_FILE, CHAIN_FILE, COMBINED_FILE, KEY_FILE};
use crate::error::{CourierError, Result};

/// The four fixed bundle locations under the certificate directory
#[derive(Debug, Clone)]
pub struct BundlePaths {
    dir: PathBuf,
}

impl BundlePaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn combined(&self) -> PathBuf {
        self.dir.join(COMBINED_FILE)
    }

    pub fn key(&self) -> PathBuf {
        self.dir.join(KEY_FILE)
    }

    pub fn cert(&self) -> PathBuf {
        self.dir.join(CERT_FILE)
    }

    pub fn chain(&self) -> PathBuf {
        self.dir.join(CHAIN_FILE)
    }

    /// The bundle form to load. The combined archive wins when both forms exist.
    pub fn locate(&self) -> Option<Bundle> {
        if self.combined().is_file() {
            return Some(Bundle::Combined(self.combined()));
        }
        if self.key().is_file() && self.cert().is_file() {
            let chain = self.chain();
            return Some(Bundle::Separate {
                key: self.key(),
                cert: self.cert(),
                chain: chain.is_file().then_some(chain),
            });
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bundle {
    /// PKCS#12 archive holding key and certificates
    Combined(PathBuf),
    /// PEM key and certificate, plus an optional PEM chain
    Separate {
        key: PathBuf,
        cert: PathBuf,
        chain: Option<PathBuf>,
    },
}

/// Read `bundle` from disk and build a server config from it.
pub fn load_server_config(bundle: &Bundle, passphrase: Option<&str>) -> Result<ServerConfig> {
    let (certs, key) = match bundle {
        Bundle::Combined(path) => {
            info!("Loading combined TLS bundle from {:?}", path);
            parse_pkcs12(&std::fs::read(path)?, passphrase.unwrap_or(""))?
        }
        Bundle::Separate { key, cert, chain } => {
            info!("Loading PEM TLS bundle from {:?}", cert);
            let chain = match chain {
                Some(path) => Some(std::fs::read(path)?),
                None => None,
            };
            parse_pem(&std::fs::read(key)?, &std::fs::read(cert)?, chain.as_deref())?
        }
    };
    debug!("TLS bundle holds {} certificate(s)", certs.len());
    server_config(certs, key)
}

type CertifiedKey = (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>);

fn parse_pkcs12(archive: &[u8], password: &str) -> Result<CertifiedKey> {
    let pfx = p12::PFX::parse(archive)
        .map_err(|e| CourierError::InvalidCertificate(format!("Malformed PKCS#12 archive: {:?}", e)))?;

    if !pfx.verify_mac(password) {
        return Err(CourierError::InvalidCertificate(
            "PKCS#12 integrity check failed (wrong passphrase?)".to_string(),
        ));
    }

    let key = pfx
        .key_bags(password)
        .map_err(|e| CourierError::InvalidCertificate(format!("Unreadable PKCS#12 key: {:?}", e)))?
        .into_iter()
        .next()
        .ok_or_else(|| CourierError::InvalidCertificate("PKCS#12 archive has no key".to_string()))?;

    let certs: Vec<CertificateDer<'static>> = pfx
        .cert_x509_bags(password)
        .map_err(|e| {
            CourierError::InvalidCertificate(format!("Unreadable PKCS#12 certificates: {:?}", e))
        })?
        .into_iter()
        .map(CertificateDer::from)
        .collect();
    if certs.is_empty() {
        return Err(CourierError::InvalidCertificate(
            "PKCS#12 archive has no certificate".to_string(),
        ));
    }

    Ok((certs, PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key))))
}

fn parse_pem(key: &[u8], cert: &[u8], chain: Option<&[u8]>) -> Result<CertifiedKey> {
    let key = rustls_pemfile::private_key(&mut BufReader::new(Cursor::new(key)))
        .map_err(|e| CourierError::InvalidCertificate(format!("Unreadable private key: {}", e)))?
        .ok_or_else(|| CourierError::InvalidCertificate("No private key in PEM".to_string()))?;

    let mut certs = read_certs(cert)?;
    if certs.is_empty() {
        return Err(CourierError::InvalidCertificate(
            "No certificate in PEM".to_string(),
        ));
    }
    if let Some(chain) = chain {
        certs.extend(read_certs(chain)?);
    }

    Ok((certs, key))
}

fn read_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    rustls_pemfile::certs(&mut BufReader::new(Cursor::new(pem)))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| CourierError::InvalidCertificate(format!("Unreadable certificate: {}", e)))
}

fn server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<ServerConfig> {
    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| CourierError::InvalidCertificate(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| CourierError::InvalidCertificate(e.to_string()))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}
