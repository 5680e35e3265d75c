use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_TAG_NAME_LEN: usize = 64;
pub const MAX_MERCHANT_LEN: usize = 256;
pub const MAX_FILENAME_LEN: usize = 256;

/// 标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
}

/// 小票记录（含已关联的标签，按名称排序）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub id: i64,
    /// 上传目录下的相对文件名
    pub file_path: String,
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
    pub receipt_date: Option<NaiveDate>,
    pub merchant: Option<String>,
    pub extracted_text: Option<String>,
    pub tags: Vec<TagRecord>,
}

impl ReceiptRecord {
    /// 有效日期：识别出的小票日期，否则取上传日期
    pub fn effective_date(&self) -> NaiveDate {
        self.receipt_date
            .unwrap_or_else(|| self.created_at.date_naive())
    }

    pub fn has_tag(&self, tag_id: i64) -> bool {
        self.tags.iter().any(|t| t.id == tag_id)
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }
}

/// 新建小票
#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub file_path: String,
    pub original_filename: String,
}

/// OCR 结果或手工编辑的元数据
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptMeta {
    pub extracted_text: Option<String>,
    pub receipt_date: Option<NaiveDate>,
    pub merchant: Option<String>,
}

/// 小票查询过滤条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptFilter {
    /// 命中任一标签即可
    pub tag_ids: Vec<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub merchant: Option<String>,
    pub limit: Option<u32>,
}

impl ReceiptFilter {
    /// 由请求参数构造过滤条件；无法解析的日期忽略，空白商户忽略
    pub fn from_params(tag_ids: &[i64], date_from: &str, date_to: &str, merchant: &str) -> Self {
        let parse = |s: &str| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok();
        let merchant = merchant.trim();
        Self {
            tag_ids: tag_ids.to_vec(),
            date_from: parse(date_from),
            date_to: parse(date_to),
            merchant: (!merchant.is_empty()).then(|| merchant.to_string()),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// 数据库操作接口
#[async_trait]
pub trait Database: Send + Sync {
    /// 新建小票记录，created_at 取当前UTC时间
    async fn insert_receipt(&self, receipt: &NewReceipt) -> Result<ReceiptRecord>;

    /// 覆盖写入 OCR 相关字段
    async fn update_receipt_meta(&self, id: i64, meta: &ReceiptMeta) -> Result<()>;

    async fn get_receipt(&self, id: i64) -> Result<Option<ReceiptRecord>>;

    /// 按过滤条件查询，created_at 倒序
    async fn list_receipts(&self, filter: &ReceiptFilter) -> Result<Vec<ReceiptRecord>>;

    /// 删除小票及其标签关联，返回是否存在
    async fn delete_receipt(&self, id: i64) -> Result<bool>;

    async fn count_receipts(&self) -> Result<i64>;

    async fn list_tags(&self) -> Result<Vec<TagRecord>>;

    async fn get_tag(&self, id: i64) -> Result<Option<TagRecord>>;

    async fn find_tag_by_name(&self, name: &str) -> Result<Option<TagRecord>>;

    async fn create_tag(&self, name: &str) -> Result<TagRecord>;

    async fn rename_tag(&self, id: i64, name: &str) -> Result<()>;

    /// 先解除全部关联再删除标签
    async fn delete_tag(&self, id: i64) -> Result<bool>;

    /// 已关联时返回 false
    async fn attach_tag(&self, receipt_id: i64, tag_id: i64) -> Result<bool>;

    /// 未关联时返回 false
    async fn detach_tag(&self, receipt_id: i64, tag_id: i64) -> Result<bool>;

    /// 健康检查
    async fn health_check(&self) -> Result<bool>;
}
