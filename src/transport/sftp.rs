// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! SFTP transport over russh

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::ssh_key::HashAlg;
use russh::keys::PublicKey;
use russh::Disconnect;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::RawSftpSession;
use russh_sftp::protocol::{FileAttributes, OpenFlags, Packet, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use zeroize::Zeroizing;

use super::{RemoteSession, Transport};
use crate::error::{CourierError, Result};
use crate::types::Endpoint;

/// Connects with public-key authentication and opens the `sftp` subsystem.
pub struct SftpTransport {
    connect_timeout: Duration,
}

impl SftpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

/// Accepts any host key and records its fingerprint. Endpoints are operator-registered
/// devices without a known_hosts store.
struct HostKeyLogger {
    address: String,
}

impl client::Handler for HostKeyLogger {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        debug!(
            "Host key for {}: {}",
            self.address,
            server_public_key.fingerprint(HashAlg::Sha256)
        );
        Ok(true)
    }
}

#[async_trait]
impl Transport for SftpTransport {
    #[instrument(skip(self, private_key), fields(endpoint = %endpoint.address()))]
    async fn connect(
        &self,
        endpoint: &Endpoint,
        username: &str,
        private_key: &[u8],
    ) -> Result<Box<dyn RemoteSession>> {
        let address = endpoint.address();

        let pem = Zeroizing::new(String::from_utf8(private_key.to_vec()).map_err(|_| {
            CourierError::AuthenticationFailed("stored private key is not valid UTF-8".to_string())
        })?);
        let key = russh::keys::decode_secret_key(&pem, None).map_err(|e| {
            CourierError::AuthenticationFailed(format!("unable to decode private key: {}", e))
        })?;

        let handle = tokio::time::timeout(
            self.connect_timeout,
            open_authenticated(endpoint, username, key),
        )
        .await
        .map_err(|_| {
            CourierError::EndpointUnreachable(format!(
                "{}: timed out after {:?}",
                address, self.connect_timeout
            ))
        })??;

        let (sftp, posix_rename) = match open_sftp(&handle, &address).await {
            Ok(opened) => opened,
            Err(e) => {
                if let Err(de) = handle.disconnect(Disconnect::ByApplication, "", "en").await {
                    debug!("Disconnect from {} after failed sftp start: {}", address, de);
                }
                return Err(e);
            }
        };

        info!("SFTP session open to {}", address);
        Ok(Box::new(SftpRemoteSession {
            address,
            handle,
            sftp,
            posix_rename,
        }))
    }
}

/// Start the `sftp` subsystem on a fresh channel. Also reports whether the server
/// advertises `posix-rename@openssh.com`.
async fn open_sftp(
    handle: &Handle<HostKeyLogger>,
    address: &str,
) -> Result<(RawSftpSession, bool)> {
    let channel = handle.channel_open_session().await.map_err(|e| {
        CourierError::EndpointUnreachable(format!("{}: failed to open channel: {}", address, e))
    })?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| {
            CourierError::EndpointUnreachable(format!(
                "{}: sftp subsystem unavailable: {}",
                address, e
            ))
        })?;

    let sftp = RawSftpSession::new(channel.into_stream());
    let version = sftp.init().await.map_err(|e| {
        CourierError::EndpointUnreachable(format!("{}: sftp handshake failed: {}", address, e))
    })?;
    let posix_rename = version
        .extensions
        .get(POSIX_RENAME)
        .is_some_and(|v| v == "1");
    debug!(
        "SFTP v{} on {}, posix-rename: {}",
        version.version, address, posix_rename
    );

    Ok((sftp, posix_rename))
}

async fn open_authenticated(
    endpoint: &Endpoint,
    username: &str,
    key: russh::keys::PrivateKey,
) -> Result<Handle<HostKeyLogger>> {
    let address = endpoint.address();
    let config = Arc::new(client::Config::default());
    let handler = HostKeyLogger {
        address: address.clone(),
    };

    let mut handle = client::connect(config, (endpoint.host.as_str(), endpoint.port), handler)
        .await
        .map_err(|e| CourierError::EndpointUnreachable(format!("{}: {}", address, e)))?;

    let hash_alg = handle
        .best_supported_rsa_hash()
        .await
        .map_err(|e| CourierError::EndpointUnreachable(format!("{}: {}", address, e)))?
        .flatten();

    let auth = handle
        .authenticate_publickey(username, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
        .await
        .map_err(|e| CourierError::AuthenticationFailed(format!("{}: {}", address, e)))?;

    if !auth.success() {
        return Err(CourierError::AuthenticationFailed(format!(
            "{}: public key rejected for user {}",
            address, username
        )));
    }

    debug!("Authenticated to {} as {}", address, username);
    Ok(handle)
}

const POSIX_RENAME: &str = "posix-rename@openssh.com";

/// Bytes per READ/WRITE request. Within the 32 KiB data size every SFTP server accepts.
const CHUNK_LEN: usize = 32 * 1024;

#[derive(Serialize)]
struct PosixRename {
    oldpath: String,
    newpath: String,
}

struct SftpRemoteSession {
    address: String,
    handle: Handle<HostKeyLogger>,
    sftp: RawSftpSession,
    posix_rename: bool,
}

impl SftpRemoteSession {
    async fn read_handle(&self, handle: &str) -> std::result::Result<Vec<u8>, SftpError> {
        let mut data = Vec::new();
        loop {
            match self
                .sftp
                .read(handle, data.len() as u64, CHUNK_LEN as u32)
                .await
            {
                Ok(chunk) if chunk.data.is_empty() => break,
                Ok(chunk) => data.extend_from_slice(&chunk.data),
                Err(SftpError::Status(status)) if status.status_code == StatusCode::Eof => break,
                Err(e) => return Err(e),
            }
        }
        Ok(data)
    }

    async fn write_handle(
        &self,
        handle: &str,
        contents: &[u8],
    ) -> std::result::Result<(), SftpError> {
        let mut offset = 0u64;
        for chunk in contents.chunks(CHUNK_LEN) {
            self.sftp.write(handle, offset, chunk.to_vec()).await?;
            offset += chunk.len() as u64;
        }
        Ok(())
    }

    /// Atomic replace of `to` via the OpenSSH extension.
    async fn replace_atomically(
        &self,
        from: &str,
        to: &str,
    ) -> std::result::Result<(), SftpError> {
        let request = PosixRename {
            oldpath: from.to_string(),
            newpath: to.to_string(),
        };
        let data = russh_sftp::ser::to_bytes(&request)?.to_vec();
        match self.sftp.extended(POSIX_RENAME, data).await? {
            Packet::Status(status) if status.status_code == StatusCode::Ok => Ok(()),
            Packet::Status(status) => Err(SftpError::Status(status)),
            _ => Err(SftpError::UnexpectedPacket),
        }
    }

    /// Plain SSH_FXP_RENAME, which most servers refuse when `to` exists.
    async fn plain_rename(&self, from: &str, to: &str) -> std::result::Result<(), SftpError> {
        self.sftp.rename(from, to).await.map(|_| ())
    }
}

#[async_trait]
impl RemoteSession for SftpRemoteSession {
    async fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let read_failed = |e: SftpError| {
            CourierError::RemoteReadFailed(format!("{}:{}: {}", self.address, path, e))
        };

        let handle = self
            .sftp
            .open(path, OpenFlags::READ, FileAttributes::empty())
            .await
            .map_err(read_failed)?
            .handle;
        let data = self.read_handle(&handle).await;
        let closed = self.sftp.close(handle).await;

        let data = data.map_err(read_failed)?;
        closed.map_err(read_failed)?;
        debug!("Read {} bytes from {}:{}", data.len(), self.address, path);
        Ok(data)
    }

    async fn write_file(&mut self, contents: &[u8], path: &str) -> Result<()> {
        let handle = self
            .sftp
            .open(
                path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
                FileAttributes::empty(),
            )
            .await
            .map_err(|e| write_failed(&self.address, path, e))?
            .handle;
        let written = self.write_handle(&handle, contents).await;
        let closed = self.sftp.close(handle).await;

        written.map_err(|e| write_failed(&self.address, path, e))?;
        closed.map_err(|e| write_failed(&self.address, path, e))?;
        debug!("Wrote {} bytes to {}:{}", contents.len(), self.address, path);
        Ok(())
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let renamed = if self.posix_rename {
            self.replace_atomically(from, to).await
        } else {
            self.plain_rename(from, to).await
        };
        renamed.map_err(|e| {
            CourierError::RemoteWriteFailed(format!(
                "{}: rename {} -> {}: {}",
                self.address, from, to, e
            ))
        })
    }

    async fn remove_file(&mut self, path: &str) -> Result<()> {
        self.sftp
            .remove(path)
            .await
            .map(|_| ())
            .map_err(|e| write_failed(&self.address, path, e))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let SftpRemoteSession {
            address,
            handle,
            sftp,
            ..
        } = *self;

        let sftp_result = sftp.close_session();
        handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| CourierError::EndpointUnreachable(format!("{}: disconnect: {}", address, e)))?;
        sftp_result.map_err(|e| {
            CourierError::EndpointUnreachable(format!("{}: sftp close: {}", address, e))
        })?;

        debug!("Closed session to {}", address);
        Ok(())
    }
}

fn write_failed(address: &str, path: &str, e: impl std::fmt::Display) -> CourierError {
    CourierError::RemoteWriteFailed(format!("{}:{}: {}", address, path, e))
}
