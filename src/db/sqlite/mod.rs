//! SQLite模块
//! 小票、标签及关联表的SQLite实现

pub mod connection;
pub mod queries;
pub mod schemas;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::info;

use super::traits::*;
use connection::ConnectionManager;
use queries::{HealthQueries, ReceiptQueries, TagQueries};
use schemas::SchemaManager;

/// SQLite数据库实现
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// 创建新的SQLite数据库实例并初始化表结构
    pub async fn new(db_path: &str) -> Result<Self> {
        let pool = ConnectionManager::create_pool(db_path).await?;
        SchemaManager::create_all_tables(&pool).await?;
        ConnectionManager::validate_pool(&pool).await?;
        info!("SQLite表结构初始化完成: {}", db_path);
        Ok(Self { pool })
    }

    /// 获取连接池引用
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn insert_receipt(&self, receipt: &NewReceipt) -> Result<ReceiptRecord> {
        ReceiptQueries::insert(&self.pool, receipt).await
    }

    async fn update_receipt_meta(&self, id: i64, meta: &ReceiptMeta) -> Result<()> {
        ReceiptQueries::update_meta(&self.pool, id, meta).await
    }

    async fn get_receipt(&self, id: i64) -> Result<Option<ReceiptRecord>> {
        ReceiptQueries::get_by_id(&self.pool, id).await
    }

    async fn list_receipts(&self, filter: &ReceiptFilter) -> Result<Vec<ReceiptRecord>> {
        ReceiptQueries::list(&self.pool, filter).await
    }

    async fn delete_receipt(&self, id: i64) -> Result<bool> {
        ReceiptQueries::delete(&self.pool, id).await
    }

    async fn count_receipts(&self) -> Result<i64> {
        ReceiptQueries::count(&self.pool).await
    }

    async fn list_tags(&self) -> Result<Vec<TagRecord>> {
        TagQueries::list(&self.pool).await
    }

    async fn get_tag(&self, id: i64) -> Result<Option<TagRecord>> {
        TagQueries::get_by_id(&self.pool, id).await
    }

    async fn find_tag_by_name(&self, name: &str) -> Result<Option<TagRecord>> {
        TagQueries::get_by_name(&self.pool, name).await
    }

    async fn create_tag(&self, name: &str) -> Result<TagRecord> {
        TagQueries::create(&self.pool, name).await
    }

    async fn rename_tag(&self, id: i64, name: &str) -> Result<()> {
        TagQueries::rename(&self.pool, id, name).await
    }

    async fn delete_tag(&self, id: i64) -> Result<bool> {
        TagQueries::delete(&self.pool, id).await
    }

    async fn attach_tag(&self, receipt_id: i64, tag_id: i64) -> Result<bool> {
        TagQueries::attach(&self.pool, receipt_id, tag_id).await
    }

    async fn detach_tag(&self, receipt_id: i64, tag_id: i64) -> Result<bool> {
        TagQueries::detach(&self.pool, receipt_id, tag_id).await
    }

    async fn health_check(&self) -> Result<bool> {
        HealthQueries::health_check(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    async fn open_db() -> (TempDir, SqliteDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("receipts.db");
        let db = SqliteDatabase::new(path.to_str().unwrap()).await.unwrap();
        (dir, db)
    }

    async fn add_receipt(db: &SqliteDatabase, name: &str) -> ReceiptRecord {
        db.insert_receipt(&NewReceipt {
            file_path: format!("{}.png", name),
            original_filename: format!("{}.png", name),
        })
        .await
        .unwrap()
    }

    /// 直接改写 created_at，便于构造确定的日期
    async fn set_created_at(db: &SqliteDatabase, id: i64, value: &str) {
        sqlx::query("UPDATE receipts SET created_at = ? WHERE id = ?")
            .bind(value)
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[tokio::test]
    async fn test_insert_update_and_get_receipt() {
        let (_dir, db) = open_db().await;
        let receipt = add_receipt(&db, "coffee").await;
        assert_eq!(db.count_receipts().await.unwrap(), 1);

        let meta = ReceiptMeta {
            extracted_text: Some("BLUE BOTTLE\n2024-03-01".into()),
            receipt_date: date(2024, 3, 1),
            merchant: Some("BLUE BOTTLE".into()),
        };
        db.update_receipt_meta(receipt.id, &meta).await.unwrap();

        let loaded = db.get_receipt(receipt.id).await.unwrap().unwrap();
        assert_eq!(loaded.merchant.as_deref(), Some("BLUE BOTTLE"));
        assert_eq!(loaded.receipt_date, date(2024, 3, 1));
        assert_eq!(loaded.created_at, receipt.created_at);
        assert!(db.get_receipt(receipt.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let (_dir, db) = open_db().await;
        let a = add_receipt(&db, "a").await;
        let b = add_receipt(&db, "b").await;
        let c = add_receipt(&db, "c").await;
        set_created_at(&db, a.id, "2024-01-02 10:00:00").await;
        set_created_at(&db, b.id, "2024-01-03 10:00:00").await;
        set_created_at(&db, c.id, "2024-01-02 10:00:00").await;

        let ids: Vec<i64> = db
            .list_receipts(&ReceiptFilter::default())
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![b.id, c.id, a.id]);

        let limited = db
            .list_receipts(&ReceiptFilter::default().with_limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_tag_filter_matches_any_without_duplicates() {
        let (_dir, db) = open_db().await;
        let food = db.create_tag("food").await.unwrap();
        let travel = db.create_tag("travel").await.unwrap();
        let r1 = add_receipt(&db, "r1").await;
        let r2 = add_receipt(&db, "r2").await;
        let _r3 = add_receipt(&db, "r3").await;

        assert!(db.attach_tag(r1.id, food.id).await.unwrap());
        assert!(db.attach_tag(r1.id, travel.id).await.unwrap());
        assert!(db.attach_tag(r2.id, travel.id).await.unwrap());
        assert!(!db.attach_tag(r2.id, travel.id).await.unwrap());

        let filter = ReceiptFilter::from_params(&[food.id, travel.id], "", "", "");
        let found = db.list_receipts(&filter).await.unwrap();
        let mut ids: Vec<i64> = found.iter().map(|r| r.id).collect();
        ids.sort();
        assert_eq!(ids, vec![r1.id, r2.id]);

        let r1_loaded = found.iter().find(|r| r.id == r1.id).unwrap();
        assert_eq!(r1_loaded.tag_names(), vec!["food", "travel"]);
    }

    #[tokio::test]
    async fn test_date_range_uses_upload_day_when_receipt_date_missing() {
        let (_dir, db) = open_db().await;
        let dated = add_receipt(&db, "dated").await;
        let undated = add_receipt(&db, "undated").await;
        let outside = add_receipt(&db, "outside").await;

        db.update_receipt_meta(
            dated.id,
            &ReceiptMeta {
                receipt_date: date(2024, 2, 10),
                ..ReceiptMeta::default()
            },
        )
        .await
        .unwrap();
        set_created_at(&db, dated.id, "2024-06-01 09:00:00").await;
        set_created_at(&db, undated.id, "2024-02-20 23:59:59").await;
        set_created_at(&db, outside.id, "2024-03-01 00:00:00").await;

        let filter = ReceiptFilter::from_params(&[], "2024-02-01", "2024-02-29", "");
        let ids: Vec<i64> = db
            .list_receipts(&filter)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![dated.id, undated.id]);

        // 无效日期被忽略
        let filter = ReceiptFilter::from_params(&[], "not-a-date", "", "");
        assert_eq!(db.list_receipts(&filter).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_merchant_filter_is_case_insensitive_and_escaped() {
        let (_dir, db) = open_db().await;
        let shop = add_receipt(&db, "shop").await;
        let text_only = add_receipt(&db, "text").await;
        let percent = add_receipt(&db, "percent").await;

        db.update_receipt_meta(
            shop.id,
            &ReceiptMeta {
                merchant: Some("Corner Market".into()),
                ..ReceiptMeta::default()
            },
        )
        .await
        .unwrap();
        db.update_receipt_meta(
            text_only.id,
            &ReceiptMeta {
                extracted_text: Some("thanks for shopping at CORNER market".into()),
                ..ReceiptMeta::default()
            },
        )
        .await
        .unwrap();
        db.update_receipt_meta(
            percent.id,
            &ReceiptMeta {
                merchant: Some("50% Outlet".into()),
                ..ReceiptMeta::default()
            },
        )
        .await
        .unwrap();

        let filter = ReceiptFilter::from_params(&[], "", "", "corner");
        let mut ids: Vec<i64> = db
            .list_receipts(&filter)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![shop.id, text_only.id]);

        let filter = ReceiptFilter::from_params(&[], "", "", "%");
        let found = db.list_receipts(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, percent.id);
    }

    #[tokio::test]
    async fn test_tag_lifecycle_and_cascade() {
        let (_dir, db) = open_db().await;
        let tag = db.create_tag("office").await.unwrap();
        assert_eq!(db.find_tag_by_name("office").await.unwrap(), Some(tag.clone()));
        assert!(db.create_tag("office").await.is_err());

        db.rename_tag(tag.id, "work").await.unwrap();
        assert_eq!(db.get_tag(tag.id).await.unwrap().unwrap().name, "work");

        let receipt = add_receipt(&db, "desk").await;
        db.attach_tag(receipt.id, tag.id).await.unwrap();
        assert!(db.detach_tag(receipt.id, tag.id).await.unwrap());
        assert!(!db.detach_tag(receipt.id, tag.id).await.unwrap());
        db.attach_tag(receipt.id, tag.id).await.unwrap();

        assert!(db.delete_tag(tag.id).await.unwrap());
        assert!(db.list_tags().await.unwrap().is_empty());
        let loaded = db.get_receipt(receipt.id).await.unwrap().unwrap();
        assert!(loaded.tags.is_empty());

        let other = db.create_tag("misc").await.unwrap();
        db.attach_tag(receipt.id, other.id).await.unwrap();
        assert!(db.delete_receipt(receipt.id).await.unwrap());
        assert!(!db.delete_receipt(receipt.id).await.unwrap());
        assert_eq!(db.count_receipts().await.unwrap(), 0);
        assert!(db.health_check().await.unwrap());
    }
}
