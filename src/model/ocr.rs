//! 小票文本识别与元数据抽取
//!
//! 识别失败一律按空文本处理，小票照常保存；超时等引擎错误额外记录
//! 失败事件并计入熔断。熔断打开时无法获取引擎，错误返回给调用方。

use crate::db::ReceiptMeta;
use crate::util::extract::{parse_date_from_text, parse_merchant_from_text};
use crate::util::logging::standards::events;
use anyhow::Context;
use chrono::NaiveDate;
use ocr_conn::ocr::ExtractorPool;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// 抽取结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMeta {
    pub extracted_text: Option<String>,
    pub receipt_date: Option<NaiveDate>,
    pub merchant: Option<String>,
}

impl ExtractedMeta {
    /// 由识别文本构造；空白文本视为无结果
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            extracted_text: Some(text.to_string()),
            receipt_date: parse_date_from_text(text),
            merchant: parse_merchant_from_text(text),
        }
    }

    pub fn into_meta(self) -> ReceiptMeta {
        ReceiptMeta {
            extracted_text: self.extracted_text,
            receipt_date: self.receipt_date,
            merchant: self.merchant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Pdf,
    Image,
    Other,
}

fn file_kind(path: &Path) -> FileKind {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => FileKind::Pdf,
        "jpg" | "jpeg" | "png" => FileKind::Image,
        _ => FileKind::Other,
    }
}

/// 对上传目录中的文件执行识别并解析日期与商户
pub async fn extract_text_and_meta(
    pool: &ExtractorPool,
    upload_folder: &Path,
    file_path: &str,
) -> anyhow::Result<ExtractedMeta> {
    let full_path: PathBuf = upload_folder.join(file_path);
    if !full_path.is_file() {
        warn!(file = %file_path, "待识别文件不存在");
        return Ok(ExtractedMeta::default());
    }

    let kind = file_kind(&full_path);
    if kind == FileKind::Other {
        debug!(file = %file_path, "不支持识别的文件类型");
        return Ok(ExtractedMeta::default());
    }

    info!(event = events::OCR_START, file = %file_path, "开始文本识别");
    let start = Instant::now();

    let handle = pool.acquire().await.context("获取OCR引擎失败")?;
    let path = full_path.clone();
    let result = tokio::task::spawn_blocking(move || match kind {
        FileKind::Pdf => handle.extract_pdf(&path),
        _ => handle.extract_image(&path),
    })
    .await
    .context("OCR任务异常退出")?;

    let text = match result {
        Ok(text) => text,
        Err(err) if err.is_data_error() => {
            info!(file = %file_path, error = %err, "识别未得到文本");
            String::new()
        }
        Err(err) => {
            warn!(
                event = events::OCR_FAILED,
                file = %file_path,
                duration_ms = start.elapsed().as_millis() as u64,
                error = %err,
                "文本识别失败，按空文本处理"
            );
            String::new()
        }
    };

    let meta = ExtractedMeta::from_text(&text);
    info!(
        event = events::OCR_COMPLETE,
        file = %file_path,
        duration_ms = start.elapsed().as_millis() as u64,
        chars = meta.extracted_text.as_deref().map(|t| t.chars().count()).unwrap_or(0),
        date_found = meta.receipt_date.is_some(),
        merchant_found = meta.merchant.is_some(),
        "文本识别完成"
    );
    Ok(meta)
}
