pub mod ocr;
pub mod preprocess;

use pdf2image::{Pages, RenderOptionsBuilder, DPI};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

// 渲染扫描件时的页数上限，超出部分不做OCR
const DEFAULT_MAX_PDF_PAGES: u32 = 20;
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// 文本抽取错误
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("external tool not found: {0}")]
    ToolNotFound(String),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("ocr pool unavailable: {0}")]
    PoolUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    /// 工具缺失或输入本身有问题时不计入引擎故障
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            ExtractionError::ToolNotFound(_) | ExtractionError::ExtractionFailed(_)
        )
    }
}

/// 运行外部命令并在超时后强制结束，返回stdout文本
pub fn run_command_with_timeout(
    mut command: Command,
    tool: &str,
    timeout: Duration,
) -> Result<String, ExtractionError> {
    let mut child = match command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExtractionError::ToolNotFound(tool.to_string()));
        }
        Err(e) => return Err(ExtractionError::Io(e)),
    };

    // stdout/stderr 由独立线程读取，避免管道写满阻塞子进程
    let stdout_reader = child.stdout.take().map(|mut out| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut err| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            child.kill().ok();
            child.wait().ok();
            return Err(ExtractionError::Timeout {
                tool: tool.to_string(),
                secs: timeout.as_secs(),
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    if status.success() {
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&stderr);
        Err(ExtractionError::ExtractionFailed(format!(
            "{} exited with {}: {}",
            tool,
            status,
            stderr.trim()
        )))
    }
}

/// 用 pdftotext 提取PDF内嵌文本，各页以换行拼接
pub fn pdf_embedded_text(
    pdftotext_binary: &Path,
    pdf_path: &Path,
    timeout: Duration,
) -> Result<String, ExtractionError> {
    let mut command = Command::new(pdftotext_binary);
    command
        .args(["-layout", "-enc", "UTF-8"])
        .arg(pdf_path)
        .arg("-");
    let raw = run_command_with_timeout(command, "pdftotext", timeout)?;
    Ok(join_pages(&raw))
}

/// pdftotext 用换页符分隔页面，末尾多一个空页
pub fn join_pages(raw: &str) -> String {
    let mut pages: Vec<&str> = raw.split('\x0C').collect();
    if pages.last().is_some_and(|s| s.trim().is_empty()) {
        pages.pop();
    }
    pages.join("\n").trim().to_string()
}

/// 将PDF各页渲染为PNG写入 `out_dir`，返回图片路径
pub fn pdf_render_pages(
    pdf_path: &Path,
    out_dir: &Path,
    dpi: u32,
) -> Result<Vec<PathBuf>, ExtractionError> {
    let bytes = std::fs::read(pdf_path)?;
    let pdf = pdf2image::PDF::from_bytes(bytes)
        .map_err(|e| ExtractionError::ExtractionFailed(format!("pdf open: {}", e)))?;

    let page_count = pdf.page_count();
    if page_count == 0 {
        return Ok(Vec::new());
    }
    let render_pages = page_count.min(DEFAULT_MAX_PDF_PAGES);
    if page_count > DEFAULT_MAX_PDF_PAGES {
        tracing::warn!(
            pages = page_count,
            limit = DEFAULT_MAX_PDF_PAGES,
            "PDF页数超出限制，仅渲染前{}页",
            DEFAULT_MAX_PDF_PAGES
        );
    }

    let dpi = dpi.clamp(72, 600);
    let mut binding = RenderOptionsBuilder::default();
    let builder = binding.pdftocairo(true).resolution(DPI::Uniform(dpi));
    let options = builder
        .build()
        .map_err(|e| ExtractionError::ExtractionFailed(format!("render options: {}", e)))?;
    let images = pdf
        .render(Pages::Range(1..=render_pages), options)
        .map_err(|e| ExtractionError::ExtractionFailed(format!("pdf render: {}", e)))?;

    Ok(images
        .into_iter()
        .enumerate()
        .filter_map(|(index, image)| {
            let path = out_dir.join(format!("page_{index}.png"));
            match image.save(&path) {
                Ok(()) => Some(path),
                Err(e) => {
                    tracing::warn!(page = index + 1, error = %e, "PDF页面图片保存失败，跳过该页");
                    None
                }
            }
        })
        .collect())
}
