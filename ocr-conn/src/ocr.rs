use crate::{pdf_embedded_text, pdf_render_pages, preprocess, run_command_with_timeout, ExtractionError};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const CIRCUIT_MAX_CONSECUTIVE_FAILURES: u32 = 5;
const CIRCUIT_COOLDOWN_SECS: u64 = 30;
const SLOW_CALL_WARN_THRESHOLD_MS: u128 = 8_000;

/// 引擎启动选项（由上层配置传入）
#[derive(Debug, Clone)]
pub struct OcrEngineOptions {
    pub tesseract_binary: PathBuf,
    pub pdftotext_binary: PathBuf,
    pub language: String,
    pub timeout_secs: u64,
    /// 内嵌文本达到该字符数即视为文本型PDF，不再OCR
    pub min_pdf_text_chars: usize,
    pub pdf_render_dpi: u32,
    pub preprocess: bool,
}

impl Default for OcrEngineOptions {
    fn default() -> Self {
        Self {
            tesseract_binary: PathBuf::from("tesseract"),
            pdftotext_binary: PathBuf::from("pdftotext"),
            language: "eng".to_string(),
            timeout_secs: 60,
            min_pdf_text_chars: 30,
            pdf_render_dpi: 150,
            preprocess: true,
        }
    }
}

/// 单次调用外部工具的抽取器
#[derive(Debug, Clone)]
pub struct Extractor {
    opts: OcrEngineOptions,
}

impl Extractor {
    pub fn new_with_options(opts: OcrEngineOptions) -> Self {
        Self { opts }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.opts.timeout_secs.max(1))
    }

    /// 图片OCR：先预处理到临时文件，失败则直接识别原图
    pub fn image_text(&self, path: &Path) -> Result<String, ExtractionError> {
        let scratch = tempfile::Builder::new().prefix("receipt-ocr").tempdir()?;
        let mut input = path.to_path_buf();

        if self.opts.preprocess {
            let dest = scratch.path().join("preprocessed.png");
            match preprocess::preprocess_file_to(path, &dest) {
                Ok(true) => input = dest,
                Ok(false) => debug!("图片无法解码，跳过预处理: {}", path.display()),
                Err(e) => warn!("预处理图片失败，使用原始文件: {}, err: {}", path.display(), e),
            }
        }

        self.tesseract(&input)
    }

    fn tesseract(&self, image: &Path) -> Result<String, ExtractionError> {
        let mut command = Command::new(&self.opts.tesseract_binary);
        command
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.opts.language);
        let start = Instant::now();
        let text = run_command_with_timeout(command, "tesseract", self.timeout())?;
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            chars = text.len(),
            "tesseract识别完成"
        );
        Ok(text)
    }

    /// PDF：优先内嵌文本，过短时按页渲染后OCR；OCR失败回退到内嵌文本
    pub fn pdf_text(&self, path: &Path) -> Result<String, ExtractionError> {
        let embedded = match pdf_embedded_text(&self.opts.pdftotext_binary, path, self.timeout()) {
            Ok(text) => text,
            Err(e) => {
                debug!("pdftotext提取失败: {}", e);
                String::new()
            }
        };

        if embedded.chars().count() >= self.opts.min_pdf_text_chars {
            return Ok(embedded);
        }

        match self.ocr_pdf_pages(path) {
            Ok(text) => Ok(text),
            Err(e) if e.is_data_error() => {
                info!("扫描件OCR不可用，回退到内嵌文本: {}", e);
                Ok(embedded)
            }
            Err(e) => {
                if embedded.is_empty() {
                    Err(e)
                } else {
                    warn!("扫描件OCR失败，回退到内嵌文本: {}", e);
                    Ok(embedded)
                }
            }
        }
    }

    fn ocr_pdf_pages(&self, path: &Path) -> Result<String, ExtractionError> {
        let scratch = tempfile::Builder::new().prefix("receipt-pdf").tempdir()?;
        let pages = pdf_render_pages(path, scratch.path(), self.opts.pdf_render_dpi)?;
        debug!(pages = pages.len(), "PDF页面渲染完成");

        let mut parts = Vec::with_capacity(pages.len());
        for page in &pages {
            parts.push(self.tesseract(page)?);
        }
        Ok(parts.join("\n").trim().to_string())
    }
}

// =====================
// 并发受限的抽取器池（信号量 + 熔断）
// =====================

#[derive(Debug)]
struct CircuitState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
    open_until_epoch: Option<SystemTime>,
}

impl CircuitState {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
            open_until: None,
            open_until_epoch: None,
        }
    }
}

struct PoolInner {
    opts: OcrEngineOptions,
    circuit: Mutex<CircuitState>,
    max: usize,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
}

impl PoolInner {
    fn record_success(&self) {
        let mut circuit = self.circuit.lock();
        if circuit.open_until.is_some() {
            info!("OCR池熔断状态解除");
        }
        circuit.consecutive_failures = 0;
        circuit.open_until = None;
        circuit.open_until_epoch = None;
    }

    fn record_failure(&self) -> bool {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let mut circuit = self.circuit.lock();
        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
        if circuit.consecutive_failures >= CIRCUIT_MAX_CONSECUTIVE_FAILURES {
            circuit.open_until = Some(Instant::now() + Duration::from_secs(CIRCUIT_COOLDOWN_SECS));
            circuit.open_until_epoch =
                Some(SystemTime::now() + Duration::from_secs(CIRCUIT_COOLDOWN_SECS));
            circuit.consecutive_failures = 0;
            warn!(
                "OCR池因连续失败进入熔断，{}秒后尝试恢复",
                CIRCUIT_COOLDOWN_SECS
            );
            true
        } else {
            false
        }
    }

    fn ensure_circuit_allows_acquire(&self) -> Result<(), ExtractionError> {
        let mut circuit = self.circuit.lock();
        if let Some(until) = circuit.open_until {
            let now = Instant::now();
            if until > now {
                let secs = until.saturating_duration_since(now).as_secs().max(1);
                return Err(ExtractionError::PoolUnavailable(format!(
                    "circuit open; retry after {}s",
                    secs
                )));
            }
            circuit.open_until = None;
            circuit.open_until_epoch = None;
            circuit.consecutive_failures = 0;
            info!("OCR池熔断期结束，恢复服务");
        }
        Ok(())
    }

    fn circuit_snapshot(&self) -> (u32, bool, Option<SystemTime>) {
        let circuit = self.circuit.lock();
        let is_open = circuit
            .open_until
            .map(|until| until > Instant::now())
            .unwrap_or(false);
        (circuit.consecutive_failures, is_open, circuit.open_until_epoch)
    }
}

pub struct ExtractorPool {
    inner: Arc<PoolInner>,
    semaphore: Arc<tokio::sync::Semaphore>,
}

/// 持有并发许可的抽取句柄，drop 时归还许可
pub struct ExtractorHandle {
    pool: Arc<PoolInner>,
    extractor: Extractor,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl ExtractorHandle {
    pub fn extract_image(&self, path: &Path) -> Result<String, ExtractionError> {
        self.observe(|e| e.image_text(path))
    }

    pub fn extract_pdf(&self, path: &Path) -> Result<String, ExtractionError> {
        self.observe(|e| e.pdf_text(path))
    }

    fn observe<F>(&self, call: F) -> Result<String, ExtractionError>
    where
        F: FnOnce(&Extractor) -> Result<String, ExtractionError>,
    {
        self.pool.total_calls.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let result = call(&self.extractor);
        let elapsed = start.elapsed();
        if elapsed.as_millis() > SLOW_CALL_WARN_THRESHOLD_MS {
            warn!(
                duration_ms = elapsed.as_millis() as u64,
                "单次OCR调用耗时超出阈值"
            );
        }

        match &result {
            Ok(_) => self.pool.record_success(),
            // 工具缺失或文件本身有问题不计入熔断
            Err(e) if e.is_data_error() => {
                info!("收到数据错误，不计入失败计数: {}", e);
            }
            Err(_) => {
                if self.pool.record_failure() {
                    warn!("OCR池进入熔断窗口");
                }
            }
        }
        result
    }
}

impl ExtractorPool {
    pub fn new(opts: OcrEngineOptions, capacity: usize) -> Self {
        let max = capacity.clamp(1, 128);
        Self {
            inner: Arc::new(PoolInner {
                opts,
                circuit: Mutex::new(CircuitState::new()),
                max,
                total_calls: AtomicU64::new(0),
                total_failures: AtomicU64::new(0),
            }),
            semaphore: Arc::new(tokio::sync::Semaphore::new(max)),
        }
    }

    /// 容量取CPU核心数的一半，至少1
    pub fn auto_size() -> usize {
        (num_cpus::get() / 2).max(1)
    }

    /// 获取一个抽取句柄（异步等待并发许可）
    pub async fn acquire(&self) -> Result<ExtractorHandle, ExtractionError> {
        self.inner.ensure_circuit_allows_acquire()?;

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ExtractionError::PoolUnavailable(format!("semaphore closed: {}", e)))?;

        // 等待许可期间熔断可能已打开
        self.inner.ensure_circuit_allows_acquire()?;

        Ok(ExtractorHandle {
            pool: self.inner.clone(),
            extractor: Extractor::new_with_options(self.inner.opts.clone()),
            _permit: permit,
        })
    }

    pub fn stats(&self) -> PoolStats {
        let capacity = self.inner.max;
        let available = self.semaphore.available_permits();
        let (consecutive_failures, circuit_open, until) = self.inner.circuit_snapshot();
        PoolStats {
            capacity,
            available,
            in_use: capacity.saturating_sub(available),
            total_calls: self.inner.total_calls.load(Ordering::Relaxed),
            total_failures: self.inner.total_failures.load(Ordering::Relaxed),
            consecutive_failures,
            circuit_open,
            circuit_open_until_epoch: until
                .and_then(|ts| ts.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub available: usize,
    pub in_use: usize,
    pub total_calls: u64,
    pub total_failures: u64,
    pub consecutive_failures: u32,
    pub circuit_open: bool,
    pub circuit_open_until_epoch: Option<u64>,
}
