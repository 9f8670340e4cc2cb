//! Secret/config partitioning
//!
//! This module is the single choke point between sensitive and
//! non-sensitive data. A `SecretPartition` never exposes its values
//! through `Debug` or `Display`; anything that prints one gets key names
//! only. Full serialization exists solely so descriptors can reach the
//! orchestrator.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::ReleaseConfiguration;

/// The non-sensitive partition; serializes and displays freely
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigPartition {
    data: IndexMap<String, String>,
}

impl ConfigPartition {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Insert a resolver-derived entry
    ///
    /// Returns the previous value when the key was already present, so the
    /// caller can detect disagreement with operator-supplied data.
    pub fn insert(&mut self, key: String, value: String) -> Option<String> {
        self.data.insert(key, value)
    }
}

/// The sensitive partition
///
/// Values are private. `Debug` and `Display` redact; use
/// [`SecretPartition::reveal`] only where the real value must flow to the
/// orchestrator.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretPartition {
    data: IndexMap<String, String>,
}

impl SecretPartition {
    /// Build a partition from raw entries
    pub fn from_entries(data: IndexMap<String, String>) -> Self {
        Self { data }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Access a secret value for wire serialization
    pub fn reveal(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Key names with values replaced by a redaction marker
    pub fn redacted(&self) -> IndexMap<String, String> {
        self.data
            .keys()
            .map(|k| (k.clone(), REDACTED.to_string()))
            .collect()
    }
}

/// Marker emitted wherever a secret value would otherwise appear
pub const REDACTED: &str = "<redacted>";

impl std::fmt::Debug for SecretPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretPartition")
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl std::fmt::Display for SecretPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}]",
            self.data.keys().cloned().collect::<Vec<_>>().join(", ")
        )
    }
}

/// Split a configuration into its two partitions
///
/// Assumes disjointness was already validated; re-checks it here because
/// leaking a secret into the config map is the one failure this module
/// exists to prevent.
pub fn partition(
    config: &ReleaseConfiguration,
) -> crate::error::Result<(ConfigPartition, SecretPartition)> {
    for key in config.secrets.keys() {
        if config.config.contains_key(key) {
            return Err(crate::error::CoreError::conflict(format!(
                "key '{}' exists in both partitions",
                key
            )));
        }
    }

    let config_partition = ConfigPartition {
        data: config.config.clone(),
    };
    let secret_partition = SecretPartition {
        data: config.secrets.clone(),
    };

    Ok((config_partition, secret_partition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixtures;

    #[test]
    fn test_partition_splits_disjoint_mappings() {
        let cfg = fixtures::two_tier();
        let (config, secrets) = partition(&cfg).unwrap();

        assert_eq!(config.get("appEnv"), Some("production"));
        assert!(secrets.contains_key("databaseUrl"));
        assert!(!config.contains_key("databaseUrl"));
    }

    #[test]
    fn test_debug_never_shows_secret_values() {
        let cfg = fixtures::two_tier();
        let (_, secrets) = partition(&cfg).unwrap();

        let debug = format!("{:?}", secrets);
        let display = format!("{}", secrets);

        assert!(debug.contains("databaseUrl"));
        assert!(!debug.contains("hunter2"));
        assert!(!display.contains("hunter2"));
        assert!(!display.contains("sk-test-123"));
    }

    #[test]
    fn test_redacted_keeps_keys_only() {
        let cfg = fixtures::two_tier();
        let (_, secrets) = partition(&cfg).unwrap();

        let redacted = secrets.redacted();
        assert_eq!(redacted.get("databaseUrl").map(String::as_str), Some(REDACTED));
        assert_eq!(redacted.len(), secrets.len());
    }

    #[test]
    fn test_overlapping_key_is_a_conflict() {
        let mut cfg = fixtures::two_tier();
        cfg.config
            .insert("databaseUrl".to_string(), "oops".to_string());

        let err = partition(&cfg).unwrap_err();
        assert!(err.to_string().contains("both partitions"));
    }

    #[test]
    fn test_reveal_returns_real_value() {
        let cfg = fixtures::two_tier();
        let (_, secrets) = partition(&cfg).unwrap();
        assert_eq!(secrets.reveal("openaiApiKey"), Some("sk-test-123"));
    }
}
