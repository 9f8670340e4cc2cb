//! Release state stores.
//!
//! Lifecycle state must survive process restarts so `status` and
//! `rollback` keep working after a crash. Two drivers:
//! - **File** (default): one zstd-compressed JSON file per version
//! - **Memory**: for tests and ephemeral runs
//!
//! Stored payloads are JSON so they stay inspectable after a manual
//! decompress; zstd keeps large descriptor sets small on disk.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::{DeployError, Result};
use crate::release::Release;

/// zstd level for stored releases
pub const COMPRESSION_LEVEL: i32 = 3;

/// Durable storage for release versions.
///
/// Implementations must be Send + Sync for use across async tasks.
/// `history` and `list` return releases newest-first.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get a specific version of a release
    async fn get(&self, name: &str, version: u32) -> Result<Release>;

    /// Get the newest version of a release
    async fn get_latest(&self, name: &str) -> Result<Release>;

    /// All versions of one release, newest first
    async fn history(&self, name: &str) -> Result<Vec<Release>>;

    /// Newest version of every known release
    async fn list(&self) -> Result<Vec<Release>>;

    /// Create or overwrite one version
    async fn save(&self, release: &Release) -> Result<()>;

    /// Delete every version of a release, returning what was deleted
    async fn delete_all(&self, name: &str) -> Result<Vec<Release>>;

    /// Check whether any version of a release exists
    async fn exists(&self, name: &str) -> Result<bool> {
        match self.get_latest(name).await {
            Ok(_) => Ok(true),
            Err(DeployError::ReleaseNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Serialize a release to compressed bytes for storage.
pub fn encode_release(release: &Release) -> Result<Vec<u8>> {
    let json =
        serde_json::to_vec(release).map_err(|e| DeployError::Serialization(e.to_string()))?;
    zstd::encode_all(std::io::Cursor::new(json), COMPRESSION_LEVEL)
        .map_err(|e| DeployError::Compression(e.to_string()))
}

/// Deserialize a release from compressed storage bytes.
pub fn decode_release(data: &[u8]) -> Result<Release> {
    let json = zstd::decode_all(std::io::Cursor::new(data))
        .map_err(|e| DeployError::Compression(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| DeployError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ReleaseState;
    use crate::testutil::two_tier_config;
    use caravel_render::{render, RenderOptions};

    fn test_release() -> Release {
        let config = two_tier_config();
        let descriptors = render("demo", &config, &RenderOptions::default())
            .unwrap()
            .into_descriptors();
        Release::for_install("demo".to_string(), config, descriptors)
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let release = test_release();
        let encoded = encode_release(&release).unwrap();
        let decoded = decode_release(&encoded).unwrap();

        assert_eq!(decoded.name, release.name);
        assert_eq!(decoded.version, release.version);
        assert_eq!(decoded.state, ReleaseState::Installing);
        assert_eq!(decoded.descriptors.len(), 6);
    }

    #[test]
    fn test_stored_payload_is_compressed() {
        let release = test_release();
        let json = serde_json::to_vec(&release).unwrap();
        let encoded = encode_release(&release).unwrap();
        assert!(encoded.len() < json.len());
    }

    #[test]
    fn test_decode_garbage_fails_cleanly() {
        let result = decode_release(b"not a zstd frame");
        assert!(matches!(result, Err(DeployError::Compression(_))));
    }
}
