use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub content_hash: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub byte_size: usize,
    pub deduplicated: bool,
}

/// Content-addressed file store for imported media.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// `<first two hash chars>/<hash>.<ext>`
    pub fn artifact_relative_path(&self, content_hash: &str, extension: &str) -> PathBuf {
        let ext = extension.trim_start_matches('.').trim();
        let ext = if ext.is_empty() { "bin" } else { ext };
        let shard = content_hash.get(..2).unwrap_or("00");
        PathBuf::from(shard).join(format!("{content_hash}.{ext}"))
    }

    /// Store bytes immutably using a hash-addressed path and atomic temp-file rename.
    pub async fn store_bytes(&self, extension: &str, bytes: &[u8]) -> anyhow::Result<StoredArtifact> {
        let content_hash = Self::sha256_hex(bytes);
        let relative_path = self.artifact_relative_path(&content_hash, extension);
        let absolute_path = self.root.join(&relative_path);

        if fs::try_exists(&absolute_path)
            .await
            .with_context(|| format!("checking artifact path {}", absolute_path.display()))?
        {
            return Ok(StoredArtifact {
                content_hash,
                relative_path,
                absolute_path,
                byte_size: bytes.len(),
                deduplicated: true,
            });
        }

        let created = write_atomic(&absolute_path, bytes).await?;
        Ok(StoredArtifact {
            content_hash,
            relative_path,
            absolute_path,
            byte_size: bytes.len(),
            deduplicated: !created,
        })
    }
}

/// Write `bytes` to `path` through a sibling temp file and a rename.
///
/// Returns `false` when a concurrent writer won the rename race for a
/// create-only target; the existing file is left in place.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<bool> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("path {} has no parent directory", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("creating directory {}", parent.display()))?;

    let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
    let mut file = fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&temp_path)
        .await
        .with_context(|| format!("opening temp file {}", temp_path.display()))?;
    file.write_all(bytes)
        .await
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;
    file.flush()
        .await
        .with_context(|| format!("flushing temp file {}", temp_path.display()))?;
    drop(file);

    match fs::rename(&temp_path, path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            let _ = fs::remove_file(&temp_path).await;
            Ok(false)
        }
        Err(err) => {
            let _ = fs::remove_file(&temp_path).await;
            Err(err).with_context(|| {
                format!(
                    "atomically renaming temp file {} -> {}",
                    temp_path.display(),
                    path.display()
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn artifact_hashing_is_stable() {
        let hash = ArtifactStore::sha256_hex(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn relative_paths_are_sharded_by_hash_prefix() {
        let store = ArtifactStore::new("/tmp/media");
        assert_eq!(
            store.artifact_relative_path("abcdef", ".png"),
            PathBuf::from("ab").join("abcdef.png")
        );
        assert_eq!(
            store.artifact_relative_path("abcdef", ""),
            PathBuf::from("ab").join("abcdef.bin")
        );
    }

    #[tokio::test]
    async fn identical_media_is_stored_once() {
        let dir = tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path());

        let first = store.store_bytes("jpg", b"same-bytes").await.expect("first store");
        let second = store.store_bytes("jpg", b"same-bytes").await.expect("second store");

        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(first.relative_path, second.relative_path);
        assert!(first.absolute_path.exists());
    }

    #[tokio::test]
    async fn atomic_write_replaces_existing_snapshot() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("store.json");

        assert!(write_atomic(&path, b"{\"v\":1}").await.expect("first write"));
        assert!(write_atomic(&path, b"{\"v\":2}").await.expect("second write"));
        let text = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(text, "{\"v\":2}");
    }
}
