//! In-memory release store for tests and ephemeral runs.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use indexmap::IndexMap;

use super::StateStore;
use crate::error::{DeployError, Result};
use crate::release::Release;

#[derive(Clone, Default)]
pub struct MemoryStore {
    // (name, version) -> release, insertion-ordered
    releases: Arc<RwLock<IndexMap<(String, u32), Release>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release_count(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<(String, u32), Release>> {
        self.releases.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<(String, u32), Release>> {
        self.releases.write().unwrap_or_else(|e| e.into_inner())
    }

    fn versions_of(&self, name: &str) -> Vec<Release> {
        let mut versions: Vec<Release> = self
            .read()
            .iter()
            .filter(|((n, _), _)| n == name)
            .map(|(_, r)| r.clone())
            .collect();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        versions
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, name: &str, version: u32) -> Result<Release> {
        let store = self.read();
        if let Some(release) = store.get(&(name.to_string(), version)) {
            return Ok(release.clone());
        }
        if store.keys().any(|(n, _)| n == name) {
            return Err(DeployError::VersionNotFound {
                name: name.to_string(),
                version,
            });
        }
        Err(DeployError::ReleaseNotFound {
            name: name.to_string(),
        })
    }

    async fn get_latest(&self, name: &str) -> Result<Release> {
        self.versions_of(name)
            .into_iter()
            .next()
            .ok_or_else(|| DeployError::ReleaseNotFound {
                name: name.to_string(),
            })
    }

    async fn history(&self, name: &str) -> Result<Vec<Release>> {
        let versions = self.versions_of(name);
        if versions.is_empty() {
            return Err(DeployError::ReleaseNotFound {
                name: name.to_string(),
            });
        }
        Ok(versions)
    }

    async fn list(&self) -> Result<Vec<Release>> {
        let mut latest: IndexMap<String, Release> = IndexMap::new();
        for release in self.read().values() {
            match latest.get(&release.name) {
                Some(existing) if existing.version >= release.version => {}
                _ => {
                    latest.insert(release.name.clone(), release.clone());
                }
            }
        }
        let mut releases: Vec<Release> = latest.into_values().collect();
        releases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(releases)
    }

    async fn save(&self, release: &Release) -> Result<()> {
        self.write()
            .insert((release.name.clone(), release.version), release.clone());
        Ok(())
    }

    async fn delete_all(&self, name: &str) -> Result<Vec<Release>> {
        let versions = self.versions_of(name);
        if versions.is_empty() {
            return Err(DeployError::ReleaseNotFound {
                name: name.to_string(),
            });
        }
        self.write().retain(|(n, _), _| n != name);
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::two_tier_config;

    fn test_release(name: &str, version: u32) -> Release {
        let mut release =
            Release::for_install(name.to_string(), two_tier_config(), Vec::new());
        release.version = version;
        release
    }

    #[tokio::test]
    async fn test_save_overwrites_same_version() {
        let store = MemoryStore::new();

        let mut release = test_release("myapp", 1);
        store.save(&release).await.unwrap();
        release.mark_active();
        store.save(&release).await.unwrap();

        assert_eq!(store.release_count(), 1);
        let stored = store.get("myapp", 1).await.unwrap();
        assert!(stored.is_terminal());
    }

    #[tokio::test]
    async fn test_latest_and_history() {
        let store = MemoryStore::new();
        store.save(&test_release("myapp", 1)).await.unwrap();
        store.save(&test_release("myapp", 2)).await.unwrap();

        assert_eq!(store.get_latest("myapp").await.unwrap().version, 2);
        let history = store.history("myapp").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 2);
    }

    #[tokio::test]
    async fn test_exists_default_impl() {
        let store = MemoryStore::new();
        assert!(!store.exists("myapp").await.unwrap());
        store.save(&test_release("myapp", 1)).await.unwrap();
        assert!(store.exists("myapp").await.unwrap());
    }
}
