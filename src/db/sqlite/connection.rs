//! SQLite连接管理
//! 处理数据库连接池的创建和管理

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const MAX_CONNECTIONS: u32 = 8;

/// SQLite连接管理器
pub struct ConnectionManager;

impl ConnectionManager {
    /// 创建新的SQLite连接池（启用外键约束，文件不存在时自动创建）
    pub async fn create_pool(db_path: &str) -> Result<SqlitePool> {
        // 确保数据库目录存在
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("创建数据库目录失败: {}", parent.display()))?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .with_context(|| format!("连接SQLite数据库失败: {}", db_path))?;

        info!("Successfully connected to SQLite database: {}", db_path);
        Ok(pool)
    }

    /// 验证连接池状态
    pub async fn validate_pool(pool: &SqlitePool) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(pool).await?;
        Ok(())
    }
}
