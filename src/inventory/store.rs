// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Configuration snapshot storage

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::error::{CourierError, Result};
use crate::files::write_atomic;
use crate::types::Snapshot;

/// Whole-snapshot reads and replacements. Each call is atomic with respect to the others.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn snapshot(&self) -> Result<Snapshot>;
    async fn replace_snapshot(&self, snapshot: Snapshot) -> Result<()>;
}

/// Snapshot held in memory and persisted in its canonical text form.
pub struct FileConfigStore {
    path: PathBuf,
    current: RwLock<Snapshot>,
}

impl FileConfigStore {
    pub async fn open(path: &Path) -> Result<Self> {
        let current = match tokio::fs::read_to_string(path).await {
            Ok(text) => Snapshot::parse(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => Snapshot::new(),
            Err(e) => return Err(e.into()),
        };
        info!("Loaded {} configuration entries from {:?}", current.len(), path);

        Ok(Self {
            path: path.to_path_buf(),
            current: RwLock::new(current),
        })
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.current.read().await.clone())
    }

    #[instrument(skip(self, snapshot), fields(entries = snapshot.len()))]
    async fn replace_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut current = self.current.write().await;

        let path = self.path.clone();
        let text = snapshot.serialize();
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            write_atomic(&path, text.as_bytes())
        })
        .await
        .map_err(|e| CourierError::Store(format!("Snapshot write task failed: {}", e)))??;

        *current = snapshot;
        Ok(())
    }
}
