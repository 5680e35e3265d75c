//! 配置加载和管理模块
//! 处理配置文件的读取、写入、环境变量覆盖和默认值生成

use super::types::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从YAML文件读取配置
    pub fn read_yaml(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let config = serde_yaml::from_str(&config_str)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        Ok(config)
    }

    /// 从环境变量读取配置覆盖
    pub fn apply_env_overrides(config: Config) -> Config {
        Self::apply_overrides_from(config, |key| std::env::var(key).ok())
    }

    /// 使用给定的变量来源覆盖配置
    pub fn apply_overrides_from<F>(mut config: Config, lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("RECEIPTS_HOST") {
            config.server.host = host.trim().to_string();
            tracing::info!("[ok] 环境变量覆盖服务器地址: {}", config.server.host);
        }

        if let Some(port_str) = lookup("RECEIPTS_PORT") {
            match port_str.trim().parse::<u16>() {
                Ok(port) => {
                    config.server.port = port;
                    tracing::info!("[ok] 环境变量覆盖服务器端口: {}", port);
                }
                Err(_) => tracing::warn!("[warn] RECEIPTS_PORT 无效: {}", port_str),
            }
        }

        if let Some(env) = lookup("RECEIPTS_ENV") {
            match Environment::parse(&env) {
                Some(parsed) => {
                    config.environment = parsed;
                    tracing::info!("[ok] 环境变量覆盖运行环境: {}", parsed.as_str());
                }
                None => tracing::warn!("[warn] RECEIPTS_ENV 无效: {}", env),
            }
        }

        if let Some(secret) = lookup("SECRET_KEY") {
            if !secret.trim().is_empty() {
                config.secret_key = secret;
                tracing::info!("[ok] 环境变量覆盖会话密钥: [安全隐藏]");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database.path = path.clone();
            tracing::info!("[ok] 环境变量覆盖数据库路径: {}", path);
        }

        if let Some(folder) = lookup("UPLOAD_FOLDER") {
            config.uploads.folder = folder.clone();
            tracing::info!("[ok] 环境变量覆盖上传目录: {}", folder);
        }

        if let Some(binary) = lookup("TESSERACT_BINARY") {
            config.ocr.tesseract_binary = binary.clone();
            tracing::info!("[ok] 环境变量覆盖tesseract路径: {}", binary);
        }

        if let Some(level) = lookup("RECEIPTS_LOG_LEVEL") {
            config.logging.level = level.trim().to_ascii_lowercase();
            tracing::info!("[ok] 环境变量覆盖日志级别: {}", config.logging.level);
        }

        Self::normalize(&mut config);
        config
    }

    /// 扩展名统一为小写且不带点
    fn normalize(config: &mut Config) {
        config.uploads.allowed_extensions = config
            .uploads
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
    }

    /// 配置加载（配置文件 + 环境变量）
    pub fn load_with_env_overrides(path: impl AsRef<Path>) -> Result<Config> {
        let base_config = Self::read_yaml(path)?;
        let config = Self::apply_env_overrides(base_config);
        tracing::info!("[ok] 配置加载完成");
        Ok(config)
    }
}

/// 配置写入器
pub struct ConfigWriter;

impl ConfigWriter {
    /// 写入配置到指定路径，确保目录存在
    pub fn write_yaml_with_dir(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml_content = serde_yaml::to_string(config)?;
        fs::write(path, yaml_content)?;
        Ok(())
    }

    /// 生成配置模板
    pub fn generate_template() -> Config {
        Config {
            server: ServerConfig::default(),
            environment: Environment::Development,
            secret_key: DEV_SECRET_KEY.to_string(),
            session_timeout: 86400,
            database: DatabaseConfig::default(),
            uploads: UploadConfig::default(),
            ocr: OcrConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("environment: production\n").unwrap();
        assert!(config.is_production());
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.uploads.max_bytes(), 20 * 1024 * 1024);
        assert_eq!(config.uploads.allowed_extensions, vec!["pdf", "png", "jpg", "jpeg"]);
        assert_eq!(config.ocr.min_pdf_text_chars, 30);
        assert_eq!(config.ocr.pdf_render_dpi, 150);
        assert_eq!(config.secret_key, DEV_SECRET_KEY);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RECEIPTS_PORT", "8080"),
            ("RECEIPTS_ENV", "prod"),
            ("SECRET_KEY", "s3cret"),
            ("UPLOAD_FOLDER", "/srv/uploads"),
            ("TESSERACT_BINARY", "/usr/local/bin/tesseract"),
            ("RECEIPTS_LOG_LEVEL", "DEBUG"),
        ]
        .into_iter()
        .collect();

        let config = ConfigLoader::apply_overrides_from(ConfigWriter::generate_template(), |k| {
            vars.get(k).map(|v| v.to_string())
        });
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.secret_key, "s3cret");
        assert_eq!(config.uploads.folder, "/srv/uploads");
        assert_eq!(config.ocr.tesseract_binary, "/usr/local/bin/tesseract");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let config = ConfigLoader::apply_overrides_from(ConfigWriter::generate_template(), |k| {
            (k == "RECEIPTS_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_extensions_are_normalized() {
        let mut template = ConfigWriter::generate_template();
        template.uploads.allowed_extensions = vec![".PDF".into(), " png ".into(), "".into()];
        let config = ConfigLoader::apply_overrides_from(template, |_| None);
        assert_eq!(config.uploads.allowed_extensions, vec!["pdf", "png"]);
    }

    #[test]
    fn test_template_roundtrips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("config.yaml");
        ConfigWriter::write_yaml_with_dir(&ConfigWriter::generate_template(), &path).unwrap();
        let loaded = ConfigLoader::read_yaml(&path).unwrap();
        assert_eq!(loaded.database.path, "instance/receipts.db");
        assert_eq!(loaded.logging.level, "info");
    }
}
