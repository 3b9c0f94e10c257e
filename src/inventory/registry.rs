// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Device registry lookups

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::error::{CourierError, Result};
use crate::types::{Endpoint, Role};

#[async_trait]
pub trait EndpointRegistry: Send + Sync {
    /// Active endpoints with `role`, in registry order
    async fn list_endpoints(&self, role: Role) -> Result<Vec<Endpoint>>;
}

/// Registry backed by a YAML (or JSON) list of endpoints, re-read on every call.
///
/// ```yaml
/// - name: primary
///   host: 10.0.0.2
///   port: 22
///   role: SOURCE
/// - host: pi-01.lan
///   role: TARGET
///   active: false
/// ```
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

#[async_trait]
impl EndpointRegistry for FileRegistry {
    #[instrument(skip(self), fields(path = ?self.path))]
    async fn list_endpoints(&self, role: Role) -> Result<Vec<Endpoint>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No device list at {:?}", self.path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let endpoints = parse_endpoints(&contents)?;
        Ok(endpoints
            .into_iter()
            .filter(|e| e.role == role && e.active)
            .collect())
    }
}

fn parse_endpoints(contents: &str) -> Result<Vec<Endpoint>> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(contents)
        .map_err(|e| CourierError::Store(format!("Failed to parse device list: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICES: &str = r#"
- name: mirror-b
  host: 10.0.0.3
  role: SOURCE
- name: pi-01
  host: 10.0.1.1
  port: 2222
  role: TARGET
- name: mirror-a
  host: 10.0.0.2
  role: SOURCE
- name: retired
  host: 10.0.0.9
  role: SOURCE
  active: false
"#;

    #[tokio::test]
    async fn test_filters_by_role_and_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.yaml");
        std::fs::write(&path, DEVICES).unwrap();
        let registry = FileRegistry::new(&path);

        let sources = registry.list_endpoints(Role::Source).await.unwrap();
        let hosts: Vec<_> = sources.iter().map(|e| e.host.as_str()).collect();
        assert_eq!(hosts, vec!["10.0.0.3", "10.0.0.2"]);

        let targets = registry.list_endpoints(Role::Target).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].port, 2222);
    }

    #[tokio::test]
    async fn test_json_list_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.yaml");
        std::fs::write(&path, r#"[{"host": "10.0.0.7", "role": "TARGET"}]"#).unwrap();

        let targets = FileRegistry::new(&path)
            .list_endpoints(Role::Target)
            .await
            .unwrap();

        assert_eq!(targets[0].host, "10.0.0.7");
        assert_eq!(targets[0].port, 22);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::new(&dir.path().join("absent.yaml"));

        assert!(registry.list_endpoints(Role::Source).await.unwrap().is_empty());
    }

    #[test]
    fn test_malformed_list_is_a_store_error() {
        assert!(matches!(
            parse_endpoints("- host: [unterminated"),
            Err(CourierError::Store(_))
        ));
    }
}
