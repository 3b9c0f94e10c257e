// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Vault key derivation and persistence

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::constants::vault::{KEY_FILE, KEY_LEN};
use crate::error::{CourierError, Result};
use crate::files::ensure_private_dir;

pub type VaultKey = Zeroizing<[u8; KEY_LEN]>;

/// Return the 32-byte vault key.
///
/// An external secret always wins and is hashed down to 32 bytes (a 64-character
/// hex string is decoded first). Otherwise the key file in `secrets_dir` is read,
/// or created exactly once with fresh random bytes.
pub fn derive_or_load_key(secrets_dir: &Path, external_secret: Option<&str>) -> Result<VaultKey> {
    if let Some(secret) = external_secret {
        return Ok(normalize_secret(secret));
    }

    ensure_private_dir(secrets_dir)?;
    let key_path = secrets_dir.join(KEY_FILE);

    match read_key_file(&key_path) {
        Ok(key) => return Ok(key),
        Err(CourierError::Io(e)) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    OsRng.fill_bytes(&mut key[..]);

    match create_key_file(&key_path, &key[..]) {
        Ok(()) => {
            info!("Generated new vault key at {:?}", key_path);
            Ok(key)
        }
        // Another caller won the race; its key is the one on disk.
        Err(e) if e.kind() == ErrorKind::AlreadyExists => read_key_file(&key_path),
        Err(e) => Err(e.into()),
    }
}

fn normalize_secret(secret: &str) -> VaultKey {
    let raw: Zeroizing<Vec<u8>> = Zeroizing::new(if secret.len() == 64 {
        hex::decode(secret).unwrap_or_else(|_| secret.as_bytes().to_vec())
    } else {
        secret.as_bytes().to_vec()
    });

    let digest = Sha256::digest(raw.as_slice());
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&digest);
    debug!("Using externally supplied vault secret");
    key
}

fn read_key_file(path: &Path) -> Result<VaultKey> {
    let bytes = Zeroizing::new(fs::read(path)?);
    if bytes.len() != KEY_LEN {
        return Err(CourierError::KeyMaterial(format!(
            "{:?} holds {} bytes, expected {}",
            path,
            bytes.len(),
            KEY_LEN
        )));
    }
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&bytes);
    Ok(key)
}

fn create_key_file(path: &Path, key: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(key)?;
    file.sync_all()
}
