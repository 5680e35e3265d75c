use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::traits::Storage;

/// 本地文件系统存储实现（上传目录位于 web 根目录之外）
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        // 确保基础目录存在
        std::fs::create_dir_all(&base_path).with_context(|| {
            format!("Failed to create upload directory: {}", base_path.display())
        })?;

        Ok(Self { base_path })
    }

    /// 存储键只允许单层文件名
    fn is_safe_key(key: &str) -> bool {
        !key.is_empty()
            && !key.contains("..")
            && !key.contains('/')
            && !key.contains('\\')
            && !key.contains(std::path::MAIN_SEPARATOR)
    }

    fn get_full_path(&self, key: &str) -> Result<PathBuf> {
        if !Self::is_safe_key(key) {
            anyhow::bail!("invalid storage key: {:?}", key);
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.get_full_path(key)?;

        // 上传目录可能在运行期间被清理
        fs::create_dir_all(&self.base_path)
            .await
            .context("Failed to create upload directory")?;

        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.get_full_path(key)?;

        match fs::remove_file(&path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to delete file")?,
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.resolve_path(key).is_some())
    }

    fn resolve_path(&self, key: &str) -> Option<PathBuf> {
        if !Self::is_safe_key(key) {
            return None;
        }
        let base = self.base_path.canonicalize().ok()?;
        let full = base.join(key).canonicalize().ok()?;
        if !full.is_file() {
            return None;
        }
        // 符号链接可能指向目录之外
        full.strip_prefix(&base).ok()?;
        Some(full)
    }

    fn root(&self) -> &Path {
        &self.base_path
    }

    async fn health_check(&self) -> Result<bool> {
        // 检查基础目录是否可访问
        self.base_path
            .try_exists()
            .context("Failed to check upload directory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_storage() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().join("uploads")).unwrap();

        let key = "0f1e2d.png";
        let data = b"\x89PNG fake";

        storage.put(key, data).await.unwrap();
        assert!(storage.exists(key).await.unwrap());

        let path = storage.resolve_path(key).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), data);

        storage.delete(key).await.unwrap();
        assert!(!storage.exists(key).await.unwrap());
        // 重复删除不报错
        storage.delete(key).await.unwrap();
        assert!(storage.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_resolve_path_rejects_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let uploads = temp_dir.path().join("uploads");
        let storage = LocalStorage::new(&uploads).unwrap();
        std::fs::write(temp_dir.path().join("secret.txt"), b"x").unwrap();
        std::fs::create_dir(uploads.join("nested")).unwrap();

        assert!(storage.resolve_path("").is_none());
        assert!(storage.resolve_path("../secret.txt").is_none());
        assert!(storage.resolve_path("nested/file.png").is_none());
        assert!(storage.resolve_path("missing.png").is_none());
        // 目录不是文件
        assert!(storage.resolve_path("nested").is_none());
        assert!(storage.put("../escape.png", b"x").await.is_err());

        storage.put("ok.pdf", b"%PDF").await.unwrap();
        let resolved = storage.resolve_path("ok.pdf").unwrap();
        assert!(resolved.starts_with(uploads.canonicalize().unwrap()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_path_rejects_symlink_escape() {
        let temp_dir = TempDir::new().unwrap();
        let uploads = temp_dir.path().join("uploads");
        let storage = LocalStorage::new(&uploads).unwrap();
        let outside = temp_dir.path().join("outside.png");
        std::fs::write(&outside, b"x").unwrap();
        std::os::unix::fs::symlink(&outside, uploads.join("link.png")).unwrap();

        assert!(storage.resolve_path("link.png").is_none());
    }
}
