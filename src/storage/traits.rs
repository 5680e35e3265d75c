use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// 存储操作trait
#[async_trait]
pub trait Storage: Send + Sync {
    /// 存储文件
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// 删除文件（不存在视为成功）
    async fn delete(&self, key: &str) -> Result<()>;

    /// 检查文件是否存在
    async fn exists(&self, key: &str) -> Result<bool>;

    /// 将存储键解析为存储根目录内的真实文件路径，越界或不存在返回 None
    fn resolve_path(&self, key: &str) -> Option<PathBuf>;

    /// 存储根目录
    fn root(&self) -> &Path;

    /// 健康检查
    async fn health_check(&self) -> Result<bool>;
}
