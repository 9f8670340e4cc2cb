//! File-based release store.
//!
//! Layout: `<base>/<release-name>/v<version>.json.zst`. Useful without
//! any external infrastructure and for backup/restore of release state.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{decode_release, encode_release, StateStore};
use crate::error::{DeployError, Result};
use crate::release::Release;

pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn release_dir(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn version_path(&self, name: &str, version: u32) -> PathBuf {
        self.release_dir(name).join(format!("v{version}.json.zst"))
    }

    fn read_release(&self, path: &Path) -> Result<Release> {
        let data = std::fs::read(path)?;
        decode_release(&data)
    }

    fn read_all_versions(&self, name: &str) -> Result<Vec<Release>> {
        let dir = self.release_dir(name);
        if !dir.exists() {
            return Err(DeployError::ReleaseNotFound {
                name: name.to_string(),
            });
        }

        let mut releases: Vec<Release> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.file_name().is_some_and(|n| n.to_string_lossy().ends_with(".json.zst")))
            .filter_map(|p| self.read_release(&p).ok())
            .collect();

        releases.sort_by(|a, b| b.version.cmp(&a.version));

        if releases.is_empty() {
            return Err(DeployError::ReleaseNotFound {
                name: name.to_string(),
            });
        }
        Ok(releases)
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn get(&self, name: &str, version: u32) -> Result<Release> {
        let path = self.version_path(name, version);
        if !path.exists() {
            // Distinguish an unknown release from an unknown version.
            if self.release_dir(name).exists() {
                return Err(DeployError::VersionNotFound {
                    name: name.to_string(),
                    version,
                });
            }
            return Err(DeployError::ReleaseNotFound {
                name: name.to_string(),
            });
        }
        self.read_release(&path)
    }

    async fn get_latest(&self, name: &str) -> Result<Release> {
        let versions = self.read_all_versions(name)?;
        versions
            .into_iter()
            .next()
            .ok_or_else(|| DeployError::ReleaseNotFound {
                name: name.to_string(),
            })
    }

    async fn history(&self, name: &str) -> Result<Vec<Release>> {
        self.read_all_versions(name)
    }

    async fn list(&self) -> Result<Vec<Release>> {
        let mut releases = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Ok(versions) = self.read_all_versions(&name) {
                if let Some(latest) = versions.into_iter().next() {
                    releases.push(latest);
                }
            }
        }
        releases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(releases)
    }

    async fn save(&self, release: &Release) -> Result<()> {
        let path = self.version_path(&release.name, release.version);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = encode_release(release)?;
        std::fs::write(&path, data)?;
        Ok(())
    }

    async fn delete_all(&self, name: &str) -> Result<Vec<Release>> {
        let releases = self.read_all_versions(name)?;
        let dir = self.release_dir(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(releases)
    }
}
