//! 上传文件落盘：扩展名白名单 + UUID 文件名

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::traits::Storage;
use crate::db::traits::MAX_FILENAME_LEN;

/// 上传策略
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// 小写扩展名，不含点
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: ["pdf", "png", "jpg", "jpeg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file or filename")]
    MissingFile,

    #[error("File type not allowed")]
    NotAllowed,

    #[error("Could not store the file. Please try again.")]
    Storage(#[source] anyhow::Error),
}

/// 取最后一个点之后的部分（小写）
fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    Some(ext.to_lowercase())
}

/// 扩展名是否在白名单内
pub fn allowed_extension(filename: &str, allowed: &[String]) -> bool {
    if filename.is_empty() {
        return false;
    }
    match extension_of(filename) {
        Some(ext) => allowed.iter().any(|a| a == &ext),
        None => false,
    }
}

/// 浏览器可能上送完整路径，只保留最后一段
fn base_filename(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim()
}

/// 超长文件名截断主干部分，保留扩展名
fn display_filename(base: &str) -> String {
    if base.chars().count() <= MAX_FILENAME_LEN {
        return base.to_string();
    }
    let (stem, ext) = base.rsplit_once('.').unwrap_or((base, ""));
    let stem_len = MAX_FILENAME_LEN.saturating_sub(ext.chars().count() + 1);
    let stem: String = stem.chars().take(stem_len).collect();
    format!("{}.{}", stem, ext)
}

/// 保存上传文件，返回 (存储文件名, 原始文件名)
pub async fn save_upload(
    storage: &dyn Storage,
    policy: &UploadPolicy,
    filename: &str,
    bytes: &[u8],
) -> Result<(String, String), UploadError> {
    let base = base_filename(filename);
    if base.is_empty() {
        return Err(UploadError::MissingFile);
    }
    if !allowed_extension(base, &policy.allowed_extensions) {
        return Err(UploadError::NotAllowed);
    }
    let ext = extension_of(base).ok_or(UploadError::NotAllowed)?;
    let original = display_filename(base);

    let stored = format!("{}.{}", Uuid::new_v4().simple(), ext);
    storage
        .put(&stored, bytes)
        .await
        .map_err(UploadError::Storage)?;

    info!(
        stored = %stored,
        original = %original,
        size = bytes.len(),
        "上传文件已保存"
    );
    Ok((stored, original))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;

    fn allowed() -> Vec<String> {
        UploadPolicy::default().allowed_extensions
    }

    #[test]
    fn test_allowed_extension() {
        let allowed = allowed();
        assert!(allowed_extension("scan.PDF", &allowed));
        assert!(allowed_extension("photo.final.jpeg", &allowed));
        assert!(!allowed_extension("archive.pdf.exe", &allowed));
        assert!(!allowed_extension("README", &allowed));
        assert!(!allowed_extension("", &allowed));
        assert!(!allowed_extension("trailing.", &allowed));
    }

    #[tokio::test]
    async fn test_save_upload_uses_uuid_name() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let policy = UploadPolicy::default();

        let (stored, original) = save_upload(&storage, &policy, "Lunch Receipt.JPG", b"data")
            .await
            .unwrap();
        assert_eq!(original, "Lunch Receipt.JPG");
        assert!(stored.ends_with(".jpg"));
        let stem = stored.trim_end_matches(".jpg");
        assert_eq!(stem.len(), 32);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(std::fs::read(dir.path().join(&stored)).unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_save_upload_errors() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let policy = UploadPolicy::default();

        let err = save_upload(&storage, &policy, "", b"x").await.unwrap_err();
        assert_eq!(err.to_string(), "No file or filename");

        let err = save_upload(&storage, &policy, "notes.txt", b"x")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "File type not allowed");

        let (_, original) = save_upload(&storage, &policy, "C:\\scans\\r.png", b"x")
            .await
            .unwrap();
        assert_eq!(original, "r.png");
    }

    #[tokio::test]
    async fn test_long_filename_keeps_extension() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let policy = UploadPolicy::default();

        let long_name = format!("{}.png", "a".repeat(260));
        let (stored, original) = save_upload(&storage, &policy, &long_name, b"x")
            .await
            .unwrap();
        assert!(stored.ends_with(".png"));
        assert_eq!(original.chars().count(), MAX_FILENAME_LEN);
        assert!(original.ends_with(".png"));
        assert!(original.starts_with("aaaa"));
    }
}
