// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::sync::DEFAULT_SSH_PORT;

/// Which side of a synchronization run an endpoint takes part in
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Holds the authoritative configuration file
    Source,
    /// Receives a copy of the locally held configuration
    Target,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Source => write!(f, "SOURCE"),
            Role::Target => write!(f, "TARGET"),
        }
    }
}

/// A remote host as supplied by the device registry. Read-only for a run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    #[serde(default)]
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub role: Role,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_active() -> bool {
    true
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, role: Role) -> Self {
        let host = host.into();
        Self {
            name: host.clone(),
            host,
            port,
            role,
            active: true,
        }
    }

    /// `host:port`, as used in log lines and audit messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_applies_defaults() {
        let endpoint: Endpoint =
            serde_json::from_str(r#"{"host": "10.0.0.5", "role": "SOURCE"}"#).unwrap();

        assert_eq!(endpoint.port, 22);
        assert!(endpoint.active);
        assert_eq!(endpoint.role, Role::Source);
        assert_eq!(endpoint.name, "");
    }

    #[test]
    fn test_role_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Target).unwrap(), r#""TARGET""#);
        assert_eq!(Role::Source.to_string(), "SOURCE");
    }

    #[test]
    fn test_address() {
        let endpoint = Endpoint::new("pi-01.lan", 2222, Role::Target);
        assert_eq!(endpoint.address(), "pi-01.lan:2222");
        assert_eq!(endpoint.name, "pi-01.lan");
    }
}
