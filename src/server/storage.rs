//! 存储系统初始化模块
//! 创建本地上传目录并校验可写

use crate::storage::{self, LocalStorage};
use crate::util::config::Config;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const PROBE_KEY: &str = ".write-probe";

/// 存储系统初始化器
pub struct StorageInitializer;

impl StorageInitializer {
    /// 根据配置创建存储实例（目录不存在时创建）
    pub async fn create_from_config(config: &Config) -> Result<Arc<dyn storage::Storage>> {
        info!(folder = %config.uploads.folder, "[storage] 初始化上传目录...");
        let storage = LocalStorage::new(&config.uploads.folder)
            .with_context(|| format!("初始化上传目录失败: {}", config.uploads.folder))?;
        Ok(Arc::new(storage))
    }

    /// 验证上传目录可读写
    pub async fn validate_connection(storage: &Arc<dyn storage::Storage>) -> Result<()> {
        let health = Self::health_check(storage).await;
        if !health.is_healthy {
            return Err(anyhow::anyhow!(
                "上传目录不可用: {}",
                health.error_message.unwrap_or_default()
            ));
        }
        info!(root = %storage.root().display(), "[ok] 上传目录验证成功");
        Ok(())
    }

    /// 写入并删除探测文件
    pub async fn health_check(storage: &Arc<dyn storage::Storage>) -> StorageHealth {
        let start = Instant::now();
        let result = async {
            if !storage.health_check().await? {
                anyhow::bail!("目录不存在: {}", storage.root().display());
            }
            storage.put(PROBE_KEY, b"ok").await?;
            storage.delete(PROBE_KEY).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => StorageHealth {
                is_healthy: true,
                response_time_ms: start.elapsed().as_millis() as u64,
                error_message: None,
            },
            Err(e) => StorageHealth {
                is_healthy: false,
                response_time_ms: start.elapsed().as_millis() as u64,
                error_message: Some(format!("{:#}", e)),
            },
        }
    }
}

/// 存储健康状态
#[derive(Debug, Clone)]
pub struct StorageHealth {
    pub is_healthy: bool,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
}
