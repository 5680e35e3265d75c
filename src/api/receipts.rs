//! 小票：列表、上传、详情、标签分配、原件访问、手工修正、重新识别、删除

use crate::api::utils::{parse_form_id, require_csrf};
use crate::db::traits::MAX_MERCHANT_LEN;
use crate::db::{NewReceipt, ReceiptFilter, ReceiptMeta, ReceiptRecord};
use crate::model::extract_text_and_meta;
use crate::storage::{save_upload, UploadError};
use crate::util::logging::standards::events;
use crate::util::report::PageRenderer;
use crate::util::session::{flash_error, flash_success, PageContext};
use crate::util::ServerError;
use crate::AppState;
use axum::body::{Body, Bytes};
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use chrono::NaiveDate;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tower_sessions::Session;
use tracing::{info, warn};

const UPLOAD_PATH: &str = "/receipts/upload";

fn detail_url(id: i64) -> String {
    format!("/receipts/{}", id)
}

/// 识别并写回元数据；未启用 OCR 时跳过
pub(crate) async fn run_ocr(app_state: &AppState, receipt: &ReceiptRecord) -> anyhow::Result<()> {
    if !app_state.config.ocr.enabled {
        return Ok(());
    }
    let meta = extract_text_and_meta(
        &app_state.extractor,
        app_state.upload_folder(),
        &receipt.file_path,
    )
    .await?;
    app_state
        .database
        .update_receipt_meta(receipt.id, &meta.into_meta())
        .await
}

async fn load_receipt(app_state: &AppState, id: i64) -> Result<ReceiptRecord, ServerError> {
    app_state
        .database
        .get_receipt(id)
        .await?
        .ok_or(ServerError::NotFound)
}

pub async fn index(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<Html<String>, ServerError> {
    let receipts = app_state
        .database
        .list_receipts(&ReceiptFilter::default())
        .await?;
    let ctx = PageContext::load(&session).await?;
    Ok(Html(PageRenderer::receipts_index(&ctx, &receipts)))
}

pub async fn upload_form(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<Html<String>, ServerError> {
    let ctx = PageContext::load(&session).await?;
    Ok(Html(PageRenderer::upload_form(
        &ctx,
        &app_state.upload_policy.allowed_extensions,
        app_state.config.uploads.max_content_length_mb,
    )))
}

fn multipart_error(err: MultipartError) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(event = events::UPLOAD_REJECTED, reason = "too_large", "上传文件超出大小限制");
        ServerError::PayloadTooLarge
    } else {
        ServerError::BadRequest(err.body_text())
    }
}

pub async fn upload(
    State(app_state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Response, ServerError> {
    let mut csrf: Option<String> = None;
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "csrf_token" => csrf = Some(field.text().await.map_err(multipart_error)?),
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload = Some((filename, bytes));
            }
            _ => {}
        }
    }
    require_csrf(&session, csrf.as_deref(), UPLOAD_PATH).await?;

    let Some((filename, bytes)) = upload.filter(|(name, _)| !name.is_empty()) else {
        flash_error(&session, "No file selected.").await?;
        return Ok(Redirect::to(UPLOAD_PATH).into_response());
    };

    let (stored, original) =
        match save_upload(app_state.storage.as_ref(), &app_state.upload_policy, &filename, &bytes).await {
            Ok(saved) => saved,
            Err(err) => {
                match &err {
                    UploadError::Storage(source) => {
                        warn!(event = events::UPLOAD_REJECTED, error = ?source, "上传文件保存失败")
                    }
                    _ => warn!(event = events::UPLOAD_REJECTED, filename = %filename, reason = %err, "上传文件被拒绝"),
                }
                flash_error(&session, err.to_string()).await?;
                return Ok(Redirect::to(UPLOAD_PATH).into_response());
            }
        };

    let receipt = match app_state
        .database
        .insert_receipt(&NewReceipt {
            file_path: stored.clone(),
            original_filename: original.clone(),
        })
        .await
    {
        Ok(receipt) => receipt,
        Err(err) => {
            // 记录写入失败时清理已落盘文件
            if let Err(e) = app_state.storage.delete(&stored).await {
                warn!(file = %stored, error = %e, "清理上传文件失败");
            }
            return Err(err.into());
        }
    };
    info!(
        event = events::RECEIPT_UPLOADED,
        receipt_id = receipt.id,
        file = %stored,
        size = bytes.len(),
        "小票已上传"
    );

    match run_ocr(&app_state, &receipt).await {
        Ok(()) => flash_success(&session, format!("Uploaded {}.", original)).await?,
        Err(err) => {
            warn!(event = events::OCR_FAILED, receipt_id = receipt.id, error = %err, "OCR失败");
            flash_error(
                &session,
                "Receipt saved; text extraction failed. You can still add tags and search by date.",
            )
            .await?;
        }
    }

    Ok(Redirect::to(&detail_url(receipt.id)).into_response())
}

pub async fn detail(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    session: Session,
) -> Result<Html<String>, ServerError> {
    let receipt = load_receipt(&app_state, id).await?;
    let all_tags = app_state.database.list_tags().await?;
    let ctx = PageContext::load(&session).await?;
    Ok(Html(PageRenderer::receipt_detail(&ctx, &receipt, &all_tags)))
}

#[derive(Debug, Deserialize)]
pub struct AssignTagForm {
    csrf_token: Option<String>,
    tag_id: Option<String>,
    action: Option<String>,
}

pub async fn assign_tag(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    session: Session,
    Form(form): Form<AssignTagForm>,
) -> Result<Redirect, ServerError> {
    let receipt = load_receipt(&app_state, id).await?;
    let url = detail_url(id);
    require_csrf(&session, form.csrf_token.as_deref(), &url).await?;

    let Some(tag_id) = parse_form_id(form.tag_id.as_deref()) else {
        return Ok(Redirect::to(&url));
    };
    let Some(tag) = app_state.database.get_tag(tag_id).await? else {
        return Ok(Redirect::to(&url));
    };

    match form.action.as_deref() {
        Some("add") if !receipt.has_tag(tag.id) => {
            if app_state.database.attach_tag(id, tag.id).await? {
                flash_success(&session, format!("Tag «{}» added.", tag.name)).await?;
            }
        }
        Some("remove") if receipt.has_tag(tag.id) => {
            if app_state.database.detach_tag(id, tag.id).await? {
                flash_success(&session, format!("Tag «{}» removed.", tag.name)).await?;
            }
        }
        _ => {}
    }
    Ok(Redirect::to(&url))
}

/// inline 展示原件；非 ASCII 文件名同时给出 RFC 5987 编码
fn content_disposition(filename: &str) -> String {
    let plain = filename.is_ascii() && !filename.contains(['"', '\\', '\r', '\n']);
    if plain {
        format!("inline; filename=\"{}\"", filename)
    } else {
        let fallback: String = filename
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || ".-_ ".contains(c) { c } else { '_' })
            .collect();
        format!(
            "inline; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            urlencoding::encode(filename)
        )
    }
}

pub async fn serve_file(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ServerError> {
    let receipt = load_receipt(&app_state, id).await?;
    let Some(path) = app_state.storage.resolve_path(&receipt.file_path) else {
        warn!(receipt_id = id, file = %receipt.file_path, "小票原件不存在或路径无效");
        return Err(ServerError::NotFound);
    };

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ServerError::Internal(anyhow::anyhow!("打开小票原件失败: {}", e)))?;
    let length = file.metadata().await.map(|m| m.len()).ok();

    let mime = mime_guess::from_path(&receipt.original_filename)
        .first()
        .or_else(|| mime_guess::from_path(&path).first())
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&mime) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&receipt.original_filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct MetaForm {
    csrf_token: Option<String>,
    #[serde(default)]
    merchant: String,
    #[serde(default)]
    receipt_date: String,
}

pub async fn update_meta(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    session: Session,
    Form(form): Form<MetaForm>,
) -> Result<Redirect, ServerError> {
    let receipt = load_receipt(&app_state, id).await?;
    let url = detail_url(id);
    require_csrf(&session, form.csrf_token.as_deref(), &url).await?;

    let date_input = form.receipt_date.trim();
    let receipt_date = if date_input.is_empty() {
        None
    } else {
        match NaiveDate::parse_from_str(date_input, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                flash_error(&session, "Invalid date. Use YYYY-MM-DD.").await?;
                return Ok(Redirect::to(&url));
            }
        }
    };
    let merchant = form.merchant.trim();
    let merchant = (!merchant.is_empty()).then(|| merchant.chars().take(MAX_MERCHANT_LEN).collect());

    let meta = ReceiptMeta {
        extracted_text: receipt.extracted_text,
        receipt_date,
        merchant,
    };
    app_state.database.update_receipt_meta(id, &meta).await?;
    info!(event = events::RECEIPT_META_UPDATED, receipt_id = id, "小票信息已手工修正");
    flash_success(&session, "Receipt details updated.").await?;
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct CsrfForm {
    csrf_token: Option<String>,
}

pub async fn reprocess(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    session: Session,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, ServerError> {
    let receipt = load_receipt(&app_state, id).await?;
    let url = detail_url(id);
    require_csrf(&session, form.csrf_token.as_deref(), &url).await?;

    if !app_state.config.ocr.enabled {
        flash_error(&session, "Text extraction is disabled.").await?;
        return Ok(Redirect::to(&url));
    }
    match run_ocr(&app_state, &receipt).await {
        Ok(()) => flash_success(&session, "Text extraction finished.").await?,
        Err(err) => {
            warn!(event = events::OCR_FAILED, receipt_id = id, error = %err, "重新识别失败");
            flash_error(&session, "Text extraction failed. Please try again later.").await?;
        }
    }
    Ok(Redirect::to(&url))
}

pub async fn delete(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    session: Session,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, ServerError> {
    let receipt = load_receipt(&app_state, id).await?;
    require_csrf(&session, form.csrf_token.as_deref(), &detail_url(id)).await?;

    if app_state.database.delete_receipt(id).await? {
        if let Err(e) = app_state.storage.delete(&receipt.file_path).await {
            warn!(receipt_id = id, file = %receipt.file_path, error = %e, "删除小票原件失败");
        }
        info!(event = events::RECEIPT_DELETED, receipt_id = id, "小票已删除");
        flash_success(&session, format!("Receipt «{}» deleted.", receipt.original_filename)).await?;
    }
    Ok(Redirect::to("/receipts/"))
}
