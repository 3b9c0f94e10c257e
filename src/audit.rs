// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Append-only operations log.
//!
//! Recording is best effort: a failed write is counted and traced but never
//! surfaces to the operation that asked for it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

use crate::constants::audit::DEFAULT_LIMIT;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// One immutable audit record
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub level: Level,
    pub created_at: DateTime<Utc>,
}

struct State {
    entries: Vec<AuditEntry>,
    next_id: u64,
}

pub struct AuditLog {
    path: Option<PathBuf>,
    state: Mutex<State>,
    /// Serializes appends. Taken before `state` is released so lines land in id order.
    writer: Mutex<()>,
    dropped: AtomicU64,
}

impl AuditLog {
    /// Open (or create) a log persisted as JSON lines at `path`.
    /// Existing entries are reloaded and ids continue after the highest one.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut entries = Vec::new();
        match fs::read_to_string(path) {
            Ok(contents) => {
                for (lineno, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<AuditEntry>(line) {
                        Ok(entry) => entries.push(entry),
                        Err(e) => warn!("Skipping unreadable audit line {}: {}", lineno + 1, e),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        info!("Audit log opened at {:?} ({} entries)", path, entries.len());

        Ok(Self {
            path: Some(path.to_path_buf()),
            state: Mutex::new(State { entries, next_id }),
            writer: Mutex::new(()),
            dropped: AtomicU64::new(0),
        })
    }

    /// A log that is never persisted
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(State {
                entries: Vec::new(),
                next_id: 1,
            }),
            writer: Mutex::new(()),
            dropped: AtomicU64::new(0),
        }
    }

    /// Append an entry. Never fails the caller.
    ///
    /// The file append is a short blocking write made after the in-memory state
    /// is unlocked.
    pub fn record(&self, kind: &str, message: &str, level: Level) {
        match level {
            Level::Info => info!(audit = kind, "{}", message),
            Level::Warn => warn!(audit = kind, "{}", message),
            Level::Error => error!(audit = kind, "{}", message),
        }

        let mut state = self.state.lock();
        let entry = AuditEntry {
            id: state.next_id,
            kind: kind.to_string(),
            message: message.to_string(),
            level,
            created_at: Utc::now(),
        };

        state.next_id += 1;
        state.entries.push(entry.clone());

        let Some(path) = &self.path else {
            return;
        };
        let _writer = self.writer.lock();
        drop(state);

        if let Err(e) = append_line(path, &entry) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Failed to persist audit entry {}: {}", entry.id, e);
        }
    }

    pub fn info(&self, kind: &str, message: &str) {
        self.record(kind, message, Level::Info);
    }

    pub fn error(&self, kind: &str, message: &str) {
        self.record(kind, message, Level::Error);
    }

    /// At most `limit` entries, most recent first
    pub fn list(&self, limit: usize) -> Vec<AuditEntry> {
        let state = self.state.lock();
        state.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Number of entries that could not be persisted
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn append_line(path: &Path, entry: &AuditEntry) -> std::io::Result<()> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

/// Interpret a user supplied limit; anything missing, non-numeric or non-positive means 200.
pub fn parse_limit(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_LIMIT)
}
