//! SQLite数据库表结构定义
//! 包含所有表的CREATE语句和索引定义

use anyhow::Result;
use sqlx::SqlitePool;

/// 数据库表结构管理器
pub struct SchemaManager;

impl SchemaManager {
    /// 创建所有表结构（幂等）
    pub async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
        Self::create_receipts_table(pool).await?;
        Self::create_tags_table(pool).await?;
        Self::create_receipt_tags_table(pool).await?;
        Ok(())
    }

    async fn create_receipts_table(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS receipts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path VARCHAR(512) NOT NULL,
                original_filename VARCHAR(256) NOT NULL,
                created_at TEXT NOT NULL,
                receipt_date TEXT,
                merchant VARCHAR(256),
                extracted_text TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_receipts_created_at ON receipts(created_at)")
            .execute(pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_receipts_receipt_date ON receipts(receipt_date)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn create_tags_table(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(64) NOT NULL UNIQUE
            )
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn create_receipt_tags_table(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS receipt_tags (
                receipt_id INTEGER NOT NULL REFERENCES receipts(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (receipt_id, tag_id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_receipt_tags_tag ON receipt_tags(tag_id)")
            .execute(pool)
            .await?;
        Ok(())
    }
}
