//! 配置管理模块
//! 负责配置文件的查找、加载、校验以及日志系统初始化

use crate::util::config::{Config, ConfigLoader, DEV_SECRET_KEY};
use crate::util::log::{cleanup_old_logs, is_valid_level, log_init_with_config, resolve_log_dir};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// 日志文件名前缀
pub const LOG_FILE_PREFIX: &str = "receipt-manager";

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 加载和验证配置
    pub fn load_and_validate() -> Result<(Config, ConfigValidationReport)> {
        let config_path = Self::find_config_file_path("config.yaml");
        info!("配置文件路径: {}", config_path.display());
        Self::load_and_validate_from(&config_path)
    }

    /// 从指定路径加载并验证配置；文件缺失时写入默认模板
    pub fn load_and_validate_from(config_path: &Path) -> Result<(Config, ConfigValidationReport)> {
        let config = match ConfigLoader::load_with_env_overrides(config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!("[warn] 配置文件读取失败: {} - {:#}", config_path.display(), e);
                Self::handle_config_load_failure(config_path)?
            }
        };

        let report = Self::validate_config(&config);
        Ok((config, report))
    }

    /// 初始化日志系统，返回的 guard 需持有到进程退出
    pub fn initialize_logging(config: &Config) -> Result<Vec<WorkerGuard>> {
        let guards = log_init_with_config(LOG_FILE_PREFIX, &config.logging)?;

        if let (Some(retention_days), true) =
            (config.logging.file.retention_days, config.logging.file.enabled)
        {
            let log_dir = resolve_log_dir(&config.logging.file.directory);
            match cleanup_old_logs(&log_dir, LOG_FILE_PREFIX, retention_days) {
                Ok(deleted) => info!(deleted, retention_days, "日志清理完成"),
                Err(e) => warn!("日志清理失败: {:#}", e),
            }
        }

        Ok(guards)
    }

    /// 查找配置文件路径，适应开发和部署目录
    pub fn find_config_file_path(filename: &str) -> PathBuf {
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let config_in_current = current_dir.join("config").join(filename);
        if config_in_current.exists() {
            return config_in_current;
        }

        // 在 bin/ 下运行时，使用上级目录的 config/
        if let Some(parent) = current_dir.parent() {
            let config_in_parent = parent.join("config").join(filename);
            if config_in_parent.exists() {
                return config_in_parent;
            }
        }

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            if exe_dir.file_name() == Some(std::ffi::OsStr::new("bin")) {
                if let Some(project_root) = exe_dir.parent() {
                    let config_in_root = project_root.join("config").join(filename);
                    if config_in_root.exists() {
                        return config_in_root;
                    }
                }
            }
        }

        current_dir.join(filename)
    }

    fn handle_config_load_failure(config_path: &Path) -> Result<Config> {
        if config_path.exists() {
            return Err(anyhow::anyhow!(
                "配置文件解析失败: {}",
                config_path.display()
            ));
        }

        info!("[note] 创建默认配置文件: {}", config_path.display());
        let config = ConfigLoader::apply_env_overrides(Config::default());
        if let Err(e) = Config::default().write_yaml_to_path(config_path) {
            warn!("[fail] 创建默认配置文件失败: {:#}", e);
        }
        Ok(config)
    }

    /// 校验配置
    pub fn validate_config(config: &Config) -> ConfigValidationReport {
        let mut report = ConfigValidationReport::new();

        Self::validate_basic_settings(config, &mut report);
        Self::validate_storage_settings(config, &mut report);
        Self::validate_ocr_settings(config, &mut report);
        report
    }

    fn validate_basic_settings(config: &Config, report: &mut ConfigValidationReport) {
        if config.server.port == 0 {
            report.add_error("server.port", "端口不能为0");
        }

        if config.session_timeout <= 0 {
            report.add_error("session_timeout", "会话超时必须大于0");
        }

        if config.secret_key.trim().is_empty() {
            report.add_error("secret_key", "会话密钥不能为空");
        } else if config.secret_key == DEV_SECRET_KEY {
            if config.is_production() {
                report.add_error("secret_key", "生产环境禁止使用开发密钥，请设置 SECRET_KEY");
            } else {
                report.add_warning("secret_key", "正在使用开发密钥，部署前请修改");
            }
        }

        if !is_valid_level(&config.logging.level) {
            report.add_error("logging.level", "日志级别无效");
        }
    }

    fn validate_storage_settings(config: &Config, report: &mut ConfigValidationReport) {
        if config.database.path.trim().is_empty() {
            report.add_error("database.path", "数据库路径不能为空");
        }

        if config.uploads.folder.trim().is_empty() {
            report.add_error("uploads.folder", "上传目录不能为空");
        }

        if config.uploads.allowed_extensions.is_empty() {
            report.add_error("uploads.allowed_extensions", "允许的扩展名列表不能为空");
        }

        if config.uploads.max_content_length_mb == 0 {
            report.add_error("uploads.max_content_length_mb", "上传大小限制必须大于0");
        }
    }

    fn validate_ocr_settings(config: &Config, report: &mut ConfigValidationReport) {
        if !config.ocr.enabled {
            report.add_info("ocr.enabled", "文本抽取已禁用");
            return;
        }

        if config.ocr.timeout_secs == 0 {
            report.add_error("ocr.timeout_secs", "OCR超时必须大于0");
        }

        if !(72..=600).contains(&config.ocr.pdf_render_dpi) {
            report.add_warning("ocr.pdf_render_dpi", "PDF渲染DPI建议在72到600之间");
        }
    }
}

/// 配置验证报告
#[derive(Debug, Clone, Default)]
pub struct ConfigValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub info: Vec<ValidationIssue>,
}

/// 验证问题
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl ConfigValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationIssue::new(field, message));
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationIssue::new(field, message));
    }

    pub fn add_info(&mut self, field: &str, message: &str) {
        self.info.push(ValidationIssue::new(field, message));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    /// 输出校验结果（需在日志系统初始化之后调用）
    pub fn log(&self) {
        for error in &self.errors {
            warn!(field = %error.field, "配置错误: {}", error.message);
        }
        for warning in &self.warnings {
            warn!(field = %warning.field, "配置警告: {}", warning.message);
        }
        for item in &self.info {
            info!(field = %item.field, "{}", item.message);
        }
    }

    fn has_error_for(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::config::Environment;

    #[test]
    fn test_dev_secret_is_warning_in_development() {
        let report = ConfigManager::validate_config(&Config::default());
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.field == "secret_key"));
    }

    #[test]
    fn test_dev_secret_is_error_in_production() {
        let mut config = Config::default();
        config.environment = Environment::Production;
        let report = ConfigManager::validate_config(&config);
        assert!(report.has_error_for("secret_key"));

        config.secret_key = "a-real-secret".into();
        assert!(ConfigManager::validate_config(&config).is_valid());
    }

    #[test]
    fn test_invalid_settings_are_errors() {
        let mut config = Config::default();
        config.server.port = 0;
        config.uploads.folder = " ".into();
        config.uploads.allowed_extensions.clear();
        config.uploads.max_content_length_mb = 0;
        config.logging.level = "loud".into();
        config.ocr.timeout_secs = 0;
        config.ocr.pdf_render_dpi = 1200;

        let report = ConfigManager::validate_config(&config);
        for field in [
            "server.port",
            "uploads.folder",
            "uploads.allowed_extensions",
            "uploads.max_content_length_mb",
            "logging.level",
            "ocr.timeout_secs",
        ] {
            assert!(report.has_error_for(field), "missing error for {field}");
        }
        assert!(report.warnings.iter().any(|w| w.field == "ocr.pdf_render_dpi"));
    }

    #[test]
    fn test_disabled_ocr_skips_ocr_checks() {
        let mut config = Config::default();
        config.ocr.enabled = false;
        config.ocr.timeout_secs = 0;
        let report = ConfigManager::validate_config(&config);
        assert!(!report.has_error_for("ocr.timeout_secs"));
        assert_eq!(report.info.len(), 1);
    }

    #[test]
    fn test_missing_file_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let (config, _) = ConfigManager::load_and_validate_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.server.port, Config::default().server.port);

        std::fs::write(&path, "server: [not, a, map]\n").unwrap();
        assert!(ConfigManager::load_and_validate_from(&path).is_err());
    }
}
