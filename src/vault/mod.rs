// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Credential vault holding the single SSH private key, encrypted at rest.

pub mod cipher;
pub mod key;

use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use zeroize::Zeroizing;

use crate::constants::vault::{PRIVATE_KEY_FILE, PUBLIC_KEY_FILE, SECRETS_DIR};
use crate::error::{CourierError, Result};
use crate::files::{ensure_private_dir, remove_if_exists, write_atomic};

pub use key::derive_or_load_key;

/// Which halves of the SSH key pair are present
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    pub has_private: bool,
    pub has_public: bool,
}

/// The vault key is re-derived on every call and dropped (zeroized) when the call returns.
pub struct CredentialVault {
    dir: PathBuf,
    external_secret: Option<String>,
}

impl CredentialVault {
    /// Vault rooted at `<data_dir>/ssh`
    pub fn new(data_dir: &Path, external_secret: Option<String>) -> Self {
        Self {
            dir: data_dir.join(SECRETS_DIR),
            external_secret,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Seal `plaintext` under the vault key.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = derive_or_load_key(&self.dir, self.external_secret.as_deref())?;
        cipher::encrypt(&key, plaintext)
    }

    /// Open a blob sealed by [`CredentialVault::encrypt`].
    pub fn decrypt(&self, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let key = derive_or_load_key(&self.dir, self.external_secret.as_deref())?;
        cipher::decrypt(&key, blob)
    }

    pub fn status(&self) -> KeyStatus {
        KeyStatus {
            has_private: self.private_key_path().exists(),
            has_public: self.public_key_path().exists(),
        }
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key_path().exists()
    }

    /// Encrypt and store the private key, replacing any previous one.
    /// The public key, if given, is stored in clear next to it.
    #[instrument(skip(self, private_key, public_key))]
    pub fn store_private_key(&self, private_key: &[u8], public_key: Option<&[u8]>) -> Result<()> {
        if private_key.is_empty() {
            return Err(CourierError::EmptyUpload("private key required".to_string()));
        }
        ensure_private_dir(&self.dir)?;

        let blob = self.encrypt(private_key)?;
        write_atomic(&self.private_key_path(), &blob)?;

        if let Some(public_key) = public_key.filter(|k| !k.is_empty()) {
            write_atomic(&self.public_key_path(), public_key)?;
        }

        info!(
            "Stored SSH private key ({} bytes sealed) in {:?}",
            private_key.len(),
            self.dir
        );
        Ok(())
    }

    /// Decrypt the stored private key. Fails with `CredentialUnavailable` if none was uploaded.
    pub fn load_private_key(&self) -> Result<Zeroizing<Vec<u8>>> {
        let blob = match fs::read(self.private_key_path()) {
            Ok(blob) => blob,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CourierError::CredentialUnavailable)
            }
            Err(e) => return Err(e.into()),
        };
        self.decrypt(&blob)
    }

    /// Delete both key files. Missing files are not an error.
    pub fn remove(&self) -> Result<()> {
        remove_if_exists(&self.private_key_path())?;
        remove_if_exists(&self.public_key_path())?;
        info!("Removed SSH key pair from {:?}", self.dir);
        Ok(())
    }

    fn private_key_path(&self) -> PathBuf {
        self.dir.join(PRIVATE_KEY_FILE)
    }

    fn public_key_path(&self) -> PathBuf {
        self.dir.join(PUBLIC_KEY_FILE)
    }
}
