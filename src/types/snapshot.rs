// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Flat key-value configuration and its `KEY=VALUE` text form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CourierError, Result};

/// Full configuration state. Keys are kept sorted so the text form is deterministic.
///
/// Every entry survives `parse(serialize(..))` unchanged; constructors reject the rest.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(
    try_from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct Snapshot(BTreeMap<String, String>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse newline-separated `KEY=VALUE` lines.
    ///
    /// Blank lines, `#` comments, lines without a key before the first `=` and
    /// lines holding a stray carriage return are skipped. Keys and values are trimmed; values are otherwise kept
    /// verbatim, quotes included. A repeated key keeps its last value.
    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if check_entry(key, value).is_err() {
                continue;
            }
            entries.insert(key.to_string(), value.to_string());
        }

        Self(entries)
    }

    /// Render as sorted `KEY=VALUE` lines with a trailing newline.
    /// An empty snapshot renders as `"\n"`.
    pub fn serialize(&self) -> String {
        let body = self
            .0
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n");
        body + "\n"
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Add or replace an entry, rejecting keys and values the text form cannot carry.
    pub fn try_insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        let (key, value) = (key.into(), value.into());
        check_entry(&key, &value)?;
        self.0.insert(key, value);
        Ok(())
    }

    pub fn try_from_iter<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut snapshot = Self::new();
        for (key, value) in entries {
            snapshot.try_insert(key, value)?;
        }
        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl TryFrom<BTreeMap<String, String>> for Snapshot {
    type Error = CourierError;

    fn try_from(entries: BTreeMap<String, String>) -> Result<Self> {
        for (key, value) in &entries {
            check_entry(key, value)?;
        }
        Ok(Self(entries))
    }
}

impl From<Snapshot> for BTreeMap<String, String> {
    fn from(snapshot: Snapshot) -> Self {
        snapshot.0
    }
}

fn check_entry(key: &str, value: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(CourierError::InvalidEntry(format!("{:?}: {}", key, reason)))
    };
    let breaks_line = |s: &str| s.contains(['\n', '\r']);

    if key.is_empty() {
        return invalid("empty key");
    }
    if key.contains('=') {
        return invalid("key contains '='");
    }
    if key.starts_with('#') {
        return invalid("key starts with '#'");
    }
    if breaks_line(key) || breaks_line(value) {
        return invalid("line break in entry");
    }
    if key.trim() != key || value.trim() != value {
        return invalid("surrounding whitespace");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_serializes_to_newline() {
        assert_eq!(Snapshot::new().serialize(), "\n");
    }

    #[test]
    fn test_parse_empty_text() {
        assert!(Snapshot::parse("").is_empty());
    }

    #[test]
    fn test_serialize_sorts_keys_regardless_of_insertion_order() {
        let mut snapshot = Snapshot::new();
        snapshot.try_insert("ZONE", "3").unwrap();
        snapshot.try_insert("ALPHA", "1").unwrap();
        snapshot.try_insert("MIDDLE", "2").unwrap();

        assert_eq!(snapshot.serialize(), "ALPHA=1\nMIDDLE=2\nZONE=3\n");
    }

    #[test]
    fn test_parse_skips_comments_blanks_and_malformed_lines() {
        let text = "# header\n\nGATEWAY=10.0.0.1\n=orphan\nnot a pair\n  # indented comment\n";
        let snapshot = Snapshot::parse(text);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("GATEWAY"), Some("10.0.0.1"));
    }

    #[test]
    fn test_parse_trims_and_keeps_quotes_verbatim() {
        let snapshot = Snapshot::parse("  NAME =  \"eth0 primary\"  \r\nMODE='dhcp'\r\n");

        assert_eq!(snapshot.get("NAME"), Some("\"eth0 primary\""));
        assert_eq!(snapshot.get("MODE"), Some("'dhcp'"));
    }

    #[test]
    fn test_parse_splits_on_first_equals() {
        let snapshot = Snapshot::parse("OPTS=a=b=c\n");
        assert_eq!(snapshot.get("OPTS"), Some("a=b=c"));
    }

    #[test]
    fn test_parse_last_duplicate_wins() {
        let snapshot = Snapshot::parse("MTU=1500\nMTU=9000\n");
        assert_eq!(snapshot.get("MTU"), Some("9000"));
    }

    #[test]
    fn test_parse_of_serialize_is_identity() {
        let snapshot = Snapshot::try_from_iter([
            ("IPADDR", "192.168.1.20"),
            ("NETMASK", "255.255.255.0"),
            ("DNS", "\"1.1.1.1 8.8.8.8\""),
            ("EMPTY", ""),
            ("URL", "http://host/?a=b"),
            ("NOTE", "a # not a comment"),
        ])
        .unwrap();

        assert_eq!(Snapshot::parse(&snapshot.serialize()), snapshot);
    }

    #[test]
    fn test_rejects_entries_the_text_form_cannot_carry() {
        let cases = [
            ("A=B", "1"),
            ("", "1"),
            ("#KEY", "1"),
            (" PAD ", "v"),
            ("PAD", " v"),
            ("X", "1\nINJECTED=evil"),
            ("X", "1\r2"),
            ("X\nY", "1"),
        ];

        for (key, value) in cases {
            let mut snapshot = Snapshot::new();
            let result = snapshot.try_insert(key, value);
            assert!(
                matches!(result, Err(CourierError::InvalidEntry(_))),
                "accepted {:?}={:?}",
                key,
                value
            );
            assert!(snapshot.is_empty());
        }
    }

    #[test]
    fn test_try_from_map_rejects_whole_map_on_one_bad_entry() {
        let entries = BTreeMap::from([
            ("GOOD".to_string(), "1".to_string()),
            ("X".to_string(), "1\nINJECTED=evil".to_string()),
        ]);

        assert!(Snapshot::try_from(entries).is_err());
    }

    #[test]
    fn test_deserialize_validates_entries() {
        let ok: Snapshot = serde_json::from_str(r#"{"MTU":"1500"}"#).unwrap();
        assert_eq!(ok.get("MTU"), Some("1500"));
        assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"MTU":"1500"}"#);

        assert!(serde_json::from_str::<Snapshot>(r#"{"A=B":"1"}"#).is_err());
    }

    #[test]
    fn test_parse_skips_stray_carriage_return() {
        let snapshot = Snapshot::parse("BAD=1\r2\nGOOD=3\r\n");

        assert_eq!(snapshot.get("BAD"), None);
        assert_eq!(snapshot.get("GOOD"), Some("3"));
        assert_eq!(Snapshot::parse(&snapshot.serialize()), snapshot);
    }
}
