//! 服务器模块
//!
//! - 配置管理 (config.rs)
//! - 数据库初始化 (database.rs)
//! - 上传目录初始化 (storage.rs)
//! - HTTP服务器设置 (http.rs)

pub mod config;
pub mod database;
pub mod http;
pub mod storage;

pub use config::{ConfigManager, ConfigValidationReport};
pub use database::{DatabaseHealth, DatabaseInitializer};
pub use http::{HttpServer, ServerManager};
pub use storage::{StorageHealth, StorageInitializer};

use crate::build_info;
use crate::util::config::Config;
use crate::AppState;
use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// 服务器引导程序：加载配置、初始化日志、创建依赖
pub struct ServerBootstrap {
    config: Config,
    validation_report: ConfigValidationReport,
    _log_guards: Vec<WorkerGuard>,
}

impl ServerBootstrap {
    pub async fn new() -> Result<Self> {
        let (config, validation_report) = ConfigManager::load_and_validate()?;
        let log_guards = ConfigManager::initialize_logging(&config)?;

        validation_report.log();
        if validation_report.has_errors() {
            return Err(anyhow::anyhow!(
                "配置验证失败: {} 个错误",
                validation_report.error_count()
            ));
        }

        info!(
            environment = config.environment.as_str(),
            warnings = validation_report.warning_count(),
            "[ok] 服务器引导程序初始化完成"
        );

        Ok(Self {
            config,
            validation_report,
            _log_guards: log_guards,
        })
    }

    /// 启动服务器，阻塞直到关闭
    pub async fn start(self) -> Result<()> {
        info!("=== 小票管理服务启动 ===");
        info!("版本信息: {}", build_info::summary());
        info!("监听地址: {}", self.config.bind_address());

        let app_state = self.create_app_state().await?;
        let server = ServerManager::create_server(&self.config, app_state).await?;
        ServerManager::start_server(server).await
    }

    async fn create_app_state(&self) -> Result<AppState> {
        let database = DatabaseInitializer::create_from_config(&self.config).await?;
        DatabaseInitializer::validate_connection(&database).await?;

        let storage = StorageInitializer::create_from_config(&self.config).await?;
        StorageInitializer::validate_connection(&storage).await?;

        Ok(AppState::new(self.config.clone(), database, storage))
    }

    /// 执行健康检查（不启动HTTP服务）
    pub async fn health_check(&self) -> Result<SystemHealthReport> {
        let database = DatabaseInitializer::create_from_config(&self.config).await?;
        let storage = StorageInitializer::create_from_config(&self.config).await?;

        let database_health = DatabaseInitializer::health_check(&database).await;
        let storage_health = StorageInitializer::health_check(&storage).await;

        Ok(SystemHealthReport {
            overall_healthy: database_health.is_healthy && storage_health.is_healthy,
            database_health,
            storage_health,
            validation_warnings: self
                .validation_report
                .warnings
                .iter()
                .map(|w| format!("{}: {}", w.field, w.message))
                .collect(),
            check_time: chrono::Utc::now(),
        })
    }
}

/// 系统健康检查报告
#[derive(Debug, Clone)]
pub struct SystemHealthReport {
    pub overall_healthy: bool,
    pub database_health: DatabaseHealth,
    pub storage_health: StorageHealth,
    pub validation_warnings: Vec<String>,
    pub check_time: chrono::DateTime<chrono::Utc>,
}

/// 便捷函数：快速启动服务器
pub async fn start_server() -> Result<()> {
    let bootstrap = ServerBootstrap::new().await?;
    bootstrap.start().await
}

/// 便捷函数：执行健康检查
pub async fn check_system_health() -> Result<SystemHealthReport> {
    let bootstrap = ServerBootstrap::new().await?;
    bootstrap.health_check().await
}
