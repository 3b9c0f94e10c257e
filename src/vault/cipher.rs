// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! AES-256-GCM sealing of vault blobs.
//!
//! Blob layout: `nonce (12) || tag (16) || ciphertext`.

use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use zeroize::Zeroizing;

use crate::constants::vault::{KEY_LEN, NONCE_LEN, TAG_LEN};
use crate::error::{CourierError, Result};

/// Encrypt `plaintext` under a fresh random nonce.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, b"", &mut buffer)
        .map_err(|e| CourierError::KeyMaterial(format!("Encryption failed: {}", e)))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + TAG_LEN + buffer.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&tag);
    blob.extend_from_slice(&buffer);
    Ok(blob)
}

/// Verify and decrypt a blob produced by [`encrypt`].
///
/// Any authentication failure yields `TamperedOrCorrupt`; no partial plaintext is returned.
pub fn decrypt(key: &[u8; KEY_LEN], blob: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(CourierError::TamperedOrCorrupt);
    }
    let (nonce, rest) = blob.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let cipher = Aes256Gcm::new(key.into());
    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            b"",
            &mut buffer[..],
            Tag::from_slice(tag),
        )
        .map_err(|_| CourierError::TamperedOrCorrupt)?;

    Ok(buffer)
}
