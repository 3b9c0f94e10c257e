// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::constants::{server, sync};

/// Service configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for the secrets directory, audit log, snapshot and device list
    pub data_dir: PathBuf,
    /// Externally supplied vault secret; overrides the on-disk key file
    pub ssh_keys_secret: Option<String>,
    pub tls_cert_dir: PathBuf,
    /// Password for the combined (PKCS#12) bundle
    pub tls_passphrase: Option<String>,
    pub http_addr: SocketAddr,
    pub https_addr: SocketAddr,
    pub ssh_username: String,
    /// Authoritative file read on source hosts
    pub source_path: String,
    /// File replaced on target hosts
    pub destination_path: String,
    pub remote_tmp_dir: String,
    pub connect_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cwd = env::current_dir().context("Unable to determine working directory")?;
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| cwd.join("data"));
        let tls_cert_dir = var("TLS_CERT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| cwd.join("certs"));

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| server::DEFAULT_BIND_ADDR.to_string());
        let bind_ip = IpAddr::from_str(&bind_addr)
            .with_context(|| format!("BIND_ADDR is not a valid IP address: {}", bind_addr))?;

        let http_port = parse_or_default("HTTP_PORT", var("HTTP_PORT"), server::DEFAULT_HTTP_PORT);
        let https_port =
            parse_or_default("HTTPS_PORT", var("HTTPS_PORT"), server::DEFAULT_HTTPS_PORT);
        let connect_timeout_secs = parse_or_default(
            "CONNECT_TIMEOUT_SECS",
            var("CONNECT_TIMEOUT_SECS"),
            sync::DEFAULT_CONNECT_TIMEOUT_SECS,
        );

        Ok(Config {
            data_dir,
            ssh_keys_secret: var("SSH_KEYS_SECRET"),
            tls_cert_dir,
            tls_passphrase: var("TLS_PASSPHRASE"),
            http_addr: SocketAddr::new(bind_ip, http_port),
            https_addr: SocketAddr::new(bind_ip, https_port),
            ssh_username: var("SSH_USERNAME").unwrap_or_else(|| sync::DEFAULT_USERNAME.to_string()),
            source_path: var("SOURCE_PATH")
                .unwrap_or_else(|| sync::DEFAULT_CONFIG_PATH.to_string()),
            destination_path: var("DESTINATION_PATH")
                .unwrap_or_else(|| sync::DEFAULT_CONFIG_PATH.to_string()),
            remote_tmp_dir: var("REMOTE_TMP_DIR")
                .unwrap_or_else(|| sync::DEFAULT_TMP_DIR.to_string()),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
        })
    }
}

fn parse_or_default<T: FromStr + Copy + std::fmt::Display>(
    name: &str,
    value: Option<String>,
    default: T,
) -> T {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
    }
}
