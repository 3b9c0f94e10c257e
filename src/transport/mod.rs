// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Remote file transport used by the sync engine.

pub mod sftp;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Endpoint;

pub use sftp::SftpTransport;

/// Opens authenticated sessions to remote hosts.
///
/// Implementations map failures onto the per-endpoint error kinds:
/// `EndpointUnreachable` for connect/handshake problems and
/// `AuthenticationFailed` for rejected or unusable keys.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        username: &str,
        private_key: &[u8],
    ) -> Result<Box<dyn RemoteSession>>;
}

/// An open session. Callers must `close` it on every exit path.
#[async_trait]
pub trait RemoteSession: Send {
    /// Read a whole remote file (`RemoteReadFailed` on error)
    async fn read_file(&mut self, path: &str) -> Result<Vec<u8>>;

    /// Create or truncate `path` and write `contents` (`RemoteWriteFailed` on error)
    async fn write_file(&mut self, contents: &[u8], path: &str) -> Result<()>;

    /// Rename `from` to `to`, replacing an existing `to` where the server
    /// allows it (`RemoteWriteFailed` on error)
    async fn rename(&mut self, from: &str, to: &str) -> Result<()>;

    /// Delete a remote file (`RemoteWriteFailed` on error)
    async fn remove_file(&mut self, path: &str) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}
