// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Files kept in the secrets directory (`<data dir>/ssh`)
pub mod vault {
    pub const SECRETS_DIR: &str = "ssh";
    /// Raw 32-byte vault key
    pub const KEY_FILE: &str = "secret.key";
    /// `nonce || tag || ciphertext` of the SSH private key
    pub const PRIVATE_KEY_FILE: &str = "id_rsa.enc";
    pub const PUBLIC_KEY_FILE: &str = "id_rsa.pub";
    pub const KEY_LEN: usize = 32;
    pub const NONCE_LEN: usize = 12;
    pub const TAG_LEN: usize = 16;
}

/// TLS bundle filenames under the certificate directory
pub mod tls {
    pub const COMBINED_FILE: &str = "server.pfx";
    pub const KEY_FILE: &str = "server.key";
    pub const CERT_FILE: &str = "server.crt";
    pub const CHAIN_FILE: &str = "chain.crt";
}

/// Audit log defaults
pub mod audit {
    pub const LOG_FILE: &str = "audit.log";
    pub const DEFAULT_LIMIT: usize = 200;

    /// Operation types recorded in audit entries
    pub mod kinds {
        pub const PULL: &str = "get";
        pub const PUSH: &str = "commit";
        pub const TLS: &str = "tls";
        pub const SSH_KEYS: &str = "ssh-keys";
    }
}

/// Remote synchronization defaults
pub mod sync {
    pub const DEFAULT_USERNAME: &str = "root";
    pub const DEFAULT_CONFIG_PATH: &str = "/etc/eni/config.settings";
    pub const DEFAULT_TMP_DIR: &str = "/tmp";
    /// Prefix of the per-attempt temporary file on target hosts
    pub const TMP_FILE_PREFIX: &str = "config.settings";
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
    pub const DEFAULT_SSH_PORT: u16 = 22;
}

/// Local collaborator files under the data directory
pub mod inventory {
    pub const DEVICES_FILE: &str = "devices.yaml";
    pub const SNAPSHOT_FILE: &str = "config.settings";
}

/// Listener defaults
pub mod server {
    pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
    pub const DEFAULT_HTTP_PORT: u16 = 8080;
    pub const DEFAULT_HTTPS_PORT: u16 = 8443;
    /// Upper bound for request bodies (certificate and key uploads)
    pub const MAX_BODY_BYTES: usize = 1024 * 1024;
}
