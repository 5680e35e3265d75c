//! CSV 导出

use super::Report;
use crate::db::ReceiptRecord;
use anyhow::{Context, Result};
use csv::{Terminator, WriterBuilder};

pub const RECEIPTS_CSV_FILENAME: &str = "receipts.csv";

const RECEIPT_HEADER: [&str; 5] = ["date", "merchant", "tags", "filename", "created_at"];

fn new_writer() -> csv::Writer<Vec<u8>> {
    WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("CSV写入失败: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV内容不是有效UTF-8")
}

/// 小票列表导出：每行一条小票，标签以逗号连接
pub fn receipts_to_csv(receipts: &[ReceiptRecord]) -> Result<String> {
    let mut writer = new_writer();
    writer.write_record(RECEIPT_HEADER)?;
    for receipt in receipts {
        let date = receipt.effective_date().format("%Y-%m-%d").to_string();
        let tags = receipt.tag_names().join(",");
        let created_at = receipt.created_at.format("%Y-%m-%d %H:%M").to_string();
        writer.write_record([
            date.as_str(),
            receipt.merchant.as_deref().unwrap_or(""),
            tags.as_str(),
            receipt.original_filename.as_str(),
            created_at.as_str(),
        ])?;
    }
    finish(writer)
}

/// 统计报告导出：`month,count` 或 `tag,count`
pub fn report_to_csv(report: &Report) -> Result<String> {
    let mut writer = new_writer();
    writer.write_record([report.kind.key_column(), "count"])?;
    for row in &report.rows {
        writer.write_record([row.key.as_str(), row.count.to_string().as_str()])?;
    }
    finish(writer)
}
