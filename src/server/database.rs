//! 数据库初始化模块
//! 根据配置创建 SQLite 数据库并校验连接

use crate::db::{self, SqliteDatabase};
use crate::util::config::Config;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// 数据库初始化器
pub struct DatabaseInitializer;

impl DatabaseInitializer {
    /// 根据配置创建数据库实例（表结构在连接时创建）
    pub async fn create_from_config(config: &Config) -> Result<Arc<dyn db::Database>> {
        info!(path = %config.database.path, "[cabinet] 初始化数据库连接...");
        let database = SqliteDatabase::new(&config.database.path)
            .await
            .with_context(|| format!("打开数据库失败: {}", config.database.path))?;
        Ok(Arc::new(database))
    }

    /// 验证数据库连接
    pub async fn validate_connection(database: &Arc<dyn db::Database>) -> Result<()> {
        let health = Self::health_check(database).await;
        if !health.is_healthy {
            return Err(anyhow::anyhow!(
                "数据库连接验证失败: {}",
                health.error_message.unwrap_or_default()
            ));
        }
        info!(response_time_ms = health.response_time_ms, "[ok] 数据库连接验证成功");
        Ok(())
    }

    /// 执行数据库健康检查
    pub async fn health_check(database: &Arc<dyn db::Database>) -> DatabaseHealth {
        let start = Instant::now();
        match database.health_check().await {
            Ok(true) => DatabaseHealth::healthy(start.elapsed().as_millis() as u64),
            Ok(false) => DatabaseHealth::unhealthy("健康检查查询返回异常".to_string()),
            Err(e) => DatabaseHealth::unhealthy(format!("{:#}", e)),
        }
    }
}

/// 数据库健康状态
#[derive(Debug, Clone)]
pub struct DatabaseHealth {
    pub is_healthy: bool,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
    pub error_message: Option<String>,
    pub last_check: chrono::DateTime<chrono::Utc>,
}

impl DatabaseHealth {
    pub fn healthy(response_time_ms: u64) -> Self {
        Self {
            is_healthy: true,
            response_time_ms,
            error_message: None,
            last_check: chrono::Utc::now(),
        }
    }

    pub fn unhealthy(error: String) -> Self {
        Self {
            is_healthy: false,
            response_time_ms: 0,
            error_message: Some(error),
            last_check: chrono::Utc::now(),
        }
    }
}
