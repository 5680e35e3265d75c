//! SQLite数据库查询操作
//! 包含小票、标签及其关联的查询实现

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

use crate::db::traits::*;

/// created_at 的存储格式，保证 SQL 中 date(created_at) 可用
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// 单条 IN 语句的绑定参数上限
const TAG_LOAD_CHUNK: usize = 500;

const RECEIPT_COLUMNS: &str =
    "id, file_path, original_filename, created_at, receipt_date, merchant, extracted_text";

/// LIKE 模式转义：`\`、`%`、`_` 按字面匹配
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// 小票查询操作
pub struct ReceiptQueries;

impl ReceiptQueries {
    pub async fn insert(pool: &SqlitePool, receipt: &NewReceipt) -> Result<ReceiptRecord> {
        let created_at = Utc::now().with_nanosecond(0).unwrap_or_else(Utc::now);

        let result = sqlx::query(
            "INSERT INTO receipts (file_path, original_filename, created_at) VALUES (?, ?, ?)",
        )
        .bind(&receipt.file_path)
        .bind(&receipt.original_filename)
        .bind(created_at.format(CREATED_AT_FORMAT).to_string())
        .execute(pool)
        .await?;

        Ok(ReceiptRecord {
            id: result.last_insert_rowid(),
            file_path: receipt.file_path.clone(),
            original_filename: receipt.original_filename.clone(),
            created_at,
            receipt_date: None,
            merchant: None,
            extracted_text: None,
            tags: Vec::new(),
        })
    }

    pub async fn update_meta(pool: &SqlitePool, id: i64, meta: &ReceiptMeta) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE receipts
            SET extracted_text = ?, receipt_date = ?, merchant = ?
            WHERE id = ?
            "#,
        )
        .bind(&meta.extracted_text)
        .bind(meta.receipt_date.map(|d| d.format(DATE_FORMAT).to_string()))
        .bind(&meta.merchant)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<ReceiptRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM receipts WHERE id = ?", RECEIPT_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut records = vec![Self::row_to_record(row)?];
        Self::load_tags(pool, &mut records).await?;
        Ok(records.pop())
    }

    /// 组合过滤条件查询：标签任一命中、有效日期区间、商户/全文子串
    pub async fn list(pool: &SqlitePool, filter: &ReceiptFilter) -> Result<Vec<ReceiptRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM receipts WHERE 1=1",
            RECEIPT_COLUMNS
        ));

        if !filter.tag_ids.is_empty() {
            // EXISTS 子查询避免多标签命中时产生重复行
            builder.push(
                " AND EXISTS (SELECT 1 FROM receipt_tags rt \
                 WHERE rt.receipt_id = receipts.id AND rt.tag_id IN (",
            );
            let mut separated = builder.separated(", ");
            for tag_id in &filter.tag_ids {
                separated.push_bind(*tag_id);
            }
            separated.push_unseparated("))");
        }

        if let Some(from) = filter.date_from {
            let from = from.format(DATE_FORMAT).to_string();
            builder
                .push(" AND (receipt_date >= ")
                .push_bind(from.clone())
                .push(" OR (receipt_date IS NULL AND date(created_at) >= ")
                .push_bind(from)
                .push("))");
        }

        if let Some(to) = filter.date_to {
            let to = to.format(DATE_FORMAT).to_string();
            builder
                .push(" AND (receipt_date <= ")
                .push_bind(to.clone())
                .push(" OR (receipt_date IS NULL AND date(created_at) <= ")
                .push_bind(to)
                .push("))");
        }

        if let Some(merchant) = &filter.merchant {
            let pattern = format!("%{}%", escape_like(merchant));
            builder
                .push(" AND (lower(merchant) LIKE lower(")
                .push_bind(pattern.clone())
                .push(") ESCAPE '\\' OR lower(extracted_text) LIKE lower(")
                .push_bind(pattern)
                .push(") ESCAPE '\\')");
        }

        builder.push(" ORDER BY created_at DESC, id DESC");

        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(pool).await?;
        let mut records = rows
            .into_iter()
            .map(Self::row_to_record)
            .collect::<Result<Vec<_>>>()?;
        Self::load_tags(pool, &mut records).await?;
        Ok(records)
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM receipt_tags WHERE receipt_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM receipts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM receipts")
            .fetch_one(pool)
            .await?;
        Ok(row.try_get("total")?)
    }

    /// 批量加载标签，每张小票的标签按名称排序
    async fn load_tags(pool: &SqlitePool, records: &mut [ReceiptRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        let mut by_receipt: HashMap<i64, Vec<TagRecord>> = HashMap::new();

        for chunk in ids.chunks(TAG_LOAD_CHUNK) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "SELECT rt.receipt_id, t.id, t.name FROM receipt_tags rt \
                 JOIN tags t ON t.id = rt.tag_id WHERE rt.receipt_id IN (",
            );
            {
                let mut separated = builder.separated(", ");
                for id in chunk {
                    separated.push_bind(*id);
                }
                separated.push_unseparated(") ORDER BY t.name");
            }

            for row in builder.build().fetch_all(pool).await? {
                let receipt_id: i64 = row.try_get("receipt_id")?;
                by_receipt.entry(receipt_id).or_default().push(TagRecord {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                });
            }
        }

        for record in records.iter_mut() {
            record.tags = by_receipt.remove(&record.id).unwrap_or_default();
        }
        Ok(())
    }

    fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<ReceiptRecord> {
        let created_at: String = row.try_get("created_at")?;
        let created_at = parse_created_at(&created_at)?;

        let receipt_date = row
            .try_get::<Option<String>, _>("receipt_date")?
            .map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT))
            .transpose()
            .context("receipt_date 格式无效")?;

        Ok(ReceiptRecord {
            id: row.try_get("id")?,
            file_path: row.try_get("file_path")?,
            original_filename: row.try_get("original_filename")?,
            created_at,
            receipt_date,
            merchant: row.try_get("merchant")?,
            extracted_text: row.try_get("extracted_text")?,
            tags: Vec::new(),
        })
    }
}

fn parse_created_at(value: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, CREATED_AT_FORMAT)
        .with_context(|| format!("created_at 格式无效: {}", value))?;
    Ok(naive.and_utc())
}

/// 标签查询操作
pub struct TagQueries;

impl TagQueries {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<TagRecord>> {
        let rows = sqlx::query("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(pool)
            .await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<TagRecord>> {
        let row = sqlx::query("SELECT id, name FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.map(Self::row_to_record).transpose()
    }

    pub async fn get_by_name(pool: &SqlitePool, name: &str) -> Result<Option<TagRecord>> {
        let row = sqlx::query("SELECT id, name FROM tags WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        row.map(Self::row_to_record).transpose()
    }

    pub async fn create(pool: &SqlitePool, name: &str) -> Result<TagRecord> {
        let result = sqlx::query("INSERT INTO tags (name) VALUES (?)")
            .bind(name)
            .execute(pool)
            .await
            .with_context(|| format!("创建标签失败: {}", name))?;
        Ok(TagRecord {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub async fn rename(pool: &SqlitePool, id: i64, name: &str) -> Result<()> {
        sqlx::query("UPDATE tags SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(pool)
            .await
            .with_context(|| format!("重命名标签失败: id={}", id))?;
        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM receipt_tags WHERE tag_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn attach(pool: &SqlitePool, receipt_id: i64, tag_id: i64) -> Result<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO receipt_tags (receipt_id, tag_id) VALUES (?, ?)")
                .bind(receipt_id)
                .bind(tag_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn detach(pool: &SqlitePool, receipt_id: i64, tag_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM receipt_tags WHERE receipt_id = ? AND tag_id = ?")
            .bind(receipt_id)
            .bind(tag_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<TagRecord> {
        Ok(TagRecord {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }
}

/// 健康检查查询
pub struct HealthQueries;

impl HealthQueries {
    pub async fn health_check(pool: &SqlitePool) -> Result<bool> {
        match sqlx::query("SELECT 1").fetch_one(pool).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("数据库健康检查失败: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("Café"), "Café");
    }

    #[test]
    fn test_parse_created_at_roundtrip_format() {
        let dt = parse_created_at("2024-01-31 08:15:00").unwrap();
        assert_eq!(dt.format(CREATED_AT_FORMAT).to_string(), "2024-01-31 08:15:00");
        assert!(parse_created_at("2024-01-31T08:15:00Z").is_err());
    }
}
