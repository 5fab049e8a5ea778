//! Disk-backed [`FileStorage`] rooted at one directory.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::FileStorage;

#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `key` under the root. Keys are relative, `/`-separated and may
    /// not climb out of the root.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.trim().is_empty() {
            bail!("storage key is empty");
        }
        let rel = Path::new(key);
        for comp in rel.components() {
            match comp {
                Component::Normal(_) => {}
                Component::CurDir => {}
                _ => bail!("storage key not allowed: {key}"),
            }
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait::async_trait]
impl FileStorage for LocalFileStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create dir failed: {}", parent.display()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("write failed: {}", path.display()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("read failed: {}", path.display()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(anyhow::Error::new(e).context(format!("delete failed: {}", path.display())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_keys_are_rejected() {
        let fs = LocalFileStorage::new("/tmp/sgp");
        assert!(fs.path_for("../etc/passwd").is_err());
        assert!(fs.path_for("csv/../../x").is_err());
        assert!(fs.path_for("/abs/path").is_err());
        assert!(fs.path_for("").is_err());
        assert!(fs.path_for("csv/state/X/a.json").is_ok());
    }

    #[tokio::test]
    async fn put_get_delete_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileStorage::new(dir.path());

        fs.put("csv/export/X.csv", b"a,b\n".to_vec()).await.unwrap();
        assert!(dir.path().join("csv/export/X.csv").exists());
        assert_eq!(fs.get("csv/export/X.csv").await.unwrap(), b"a,b\n");

        fs.delete("csv/export/X.csv").await.unwrap();
        fs.delete("csv/export/X.csv").await.unwrap();
        assert!(fs.get("csv/export/X.csv").await.is_err());
    }
}
