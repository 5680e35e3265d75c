//! 配置结构定义模块
//! 包含系统配置的所有数据结构

use ocr_conn::ocr::OcrEngineOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 开发环境兜底密钥，生产环境禁止使用
pub const DEV_SECRET_KEY: &str = "dev-secret-change-in-production";

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    /// 会话闲置超时（秒）
    #[serde(default = "default_session_timeout")]
    pub session_timeout: i64,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 运行环境
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 单个请求超时（秒），需覆盖上传时同步OCR的耗时
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_folder")]
    pub folder: String,
    #[serde(default = "default_max_content_length_mb")]
    pub max_content_length_mb: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl UploadConfig {
    pub fn max_bytes(&self) -> usize {
        (self.max_content_length_mb as usize).saturating_mul(1024 * 1024)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            folder: default_upload_folder(),
            max_content_length_mb: default_max_content_length_mb(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

/// OCR 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tesseract_binary")]
    pub tesseract_binary: String,
    #[serde(default = "default_pdftotext_binary")]
    pub pdftotext_binary: String,
    #[serde(default = "default_ocr_language")]
    pub language: String,
    #[serde(default = "default_min_pdf_text_chars")]
    pub min_pdf_text_chars: usize,
    #[serde(default = "default_pdf_render_dpi")]
    pub pdf_render_dpi: u32,
    /// 0 表示按CPU核心数自动计算
    #[serde(default)]
    pub max_concurrent: usize,
    #[serde(default = "default_ocr_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub preprocess: bool,
}

impl OcrConfig {
    pub fn engine_options(&self) -> OcrEngineOptions {
        OcrEngineOptions {
            tesseract_binary: PathBuf::from(&self.tesseract_binary),
            pdftotext_binary: PathBuf::from(&self.pdftotext_binary),
            language: self.language.clone(),
            timeout_secs: self.timeout_secs,
            min_pdf_text_chars: self.min_pdf_text_chars,
            pdf_render_dpi: self.pdf_render_dpi,
            preprocess: self.preprocess,
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tesseract_binary: default_tesseract_binary(),
            pdftotext_binary: default_pdftotext_binary(),
            language: default_ocr_language(),
            min_pdf_text_chars: default_min_pdf_text_chars(),
            pdf_render_dpi: default_pdf_render_dpi(),
            max_concurrent: 0,
            timeout_secs: default_ocr_timeout(),
            preprocess: true,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: LogFileConfig,
    pub structured: Option<bool>, // 是否启用结构化(JSON)日志
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: LogFileConfig::default(),
            structured: Some(false),
        }
    }
}

/// 日志文件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileConfig {
    pub enabled: bool,
    pub directory: String,
    pub retention_days: Option<u32>,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: "logs".to_string(),
            retention_days: Some(7),
        }
    }
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn default_secret_key() -> String {
    DEV_SECRET_KEY.to_string()
}

fn default_session_timeout() -> i64 {
    86400
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_request_timeout() -> u64 {
    300
}

fn default_database_path() -> String {
    "instance/receipts.db".to_string()
}

fn default_upload_folder() -> String {
    "instance/uploads".to_string()
}

fn default_max_content_length_mb() -> u64 {
    20
}

fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "png", "jpg", "jpeg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_tesseract_binary() -> String {
    "tesseract".to_string()
}

fn default_pdftotext_binary() -> String {
    "pdftotext".to_string()
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

fn default_min_pdf_text_chars() -> usize {
    30
}

fn default_pdf_render_dpi() -> u32 {
    150
}

fn default_ocr_timeout() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}
