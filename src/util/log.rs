use crate::util::config::LoggingConfig;
use std::io;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter::EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// 访问日志使用的 target，单独写入 access 文件
pub const ACCESS_TARGET: &str = "http.server";

/// 按配置初始化日志：控制台始终开启，文件按天滚动（可选），JSON格式（可选）。
///
/// 返回的 guard 需在进程存活期间持有，否则非阻塞写入线程会提前退出。
/// 重复初始化（例如测试中）不会报错，只是沿用已有的全局 subscriber。
pub fn log_init_with_config(
    file_prefix: &str,
    config: &LoggingConfig,
) -> anyhow::Result<Vec<WorkerGuard>> {
    let level_filter = parse_level(&config.level);
    let level = level_filter_to_str(level_filter);
    let use_json = config.structured.unwrap_or(false);

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guards = Vec::new();

    let stdout_filter = EnvFilter::try_new(format!("{level},sqlx=warn"))
        .unwrap_or_else(|_| EnvFilter::new(level));
    layers.push(if use_json {
        layer()
            .json()
            .with_writer(io::stdout)
            .with_filter(stdout_filter)
            .boxed()
    } else {
        layer()
            .with_target(false)
            .with_writer(io::stdout)
            .with_filter(stdout_filter)
            .boxed()
    });

    let mut log_dir = None;
    if config.file.enabled {
        let dir = resolve_log_dir(&config.file.directory);
        std::fs::create_dir_all(&dir)?;

        let (main_writer, main_guard) =
            tracing_appender::non_blocking(daily(&dir, format!("{}-info", file_prefix)));
        let (access_writer, access_guard) =
            tracing_appender::non_blocking(daily(&dir, format!("{}-access", file_prefix)));
        guards.push(main_guard);
        guards.push(access_guard);

        let main_filter = EnvFilter::try_new(format!("{level},sqlx=warn,{ACCESS_TARGET}=off"))
            .unwrap_or_else(|_| EnvFilter::new(level));
        let access_filter = EnvFilter::try_new(format!("{ACCESS_TARGET}={level}"))
            .unwrap_or_else(|_| EnvFilter::new("http.server=info"));

        if use_json {
            layers.push(
                layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(main_writer)
                    .with_filter(main_filter)
                    .boxed(),
            );
            layers.push(
                layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(access_writer)
                    .with_filter(access_filter)
                    .boxed(),
            );
        } else {
            layers.push(
                layer()
                    .with_ansi(false)
                    .with_writer(main_writer)
                    .with_filter(main_filter)
                    .boxed(),
            );
            layers.push(
                layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(access_writer)
                    .with_filter(access_filter)
                    .boxed(),
            );
        }
        log_dir = Some(dir);
    }

    if Registry::default().with(layers).try_init().is_err() {
        tracing::debug!("日志系统已初始化，跳过");
        return Ok(guards);
    }

    tracing::info!(
        event = "log.init",
        level = %config.level,
        console = true,
        file = config.file.enabled,
        directory = %log_dir.as_deref().map(|d| d.display().to_string()).unwrap_or_default(),
        rotation = "daily",
        structured = use_json
    );
    if let (Some(retention), true) = (config.file.retention_days, config.file.enabled) {
        tracing::info!(event = "log.retention", days = retention);
    }

    Ok(guards)
}

/// 相对路径基于工作目录；在 bin/ 下运行时基于上级目录
pub fn resolve_log_dir(directory: &str) -> PathBuf {
    let path = Path::new(directory);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if current_dir.file_name() == Some(std::ffi::OsStr::new("bin")) {
        if let Some(parent) = current_dir.parent() {
            return parent.join(directory);
        }
    }
    current_dir.join(directory)
}

/// 删除超过保留天数的日志文件，返回删除数量
pub fn cleanup_old_logs(log_dir: &Path, file_prefix: &str, retention_days: u32) -> anyhow::Result<usize> {
    if !log_dir.exists() {
        tracing::debug!("日志目录不存在: {}", log_dir.display());
        return Ok(0);
    }

    let retention = std::time::Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);
    let cutoff = std::time::SystemTime::now()
        .checked_sub(retention)
        .unwrap_or(std::time::UNIX_EPOCH);

    let mut deleted_count = 0;
    let mut total_size_deleted = 0u64;

    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        // 只处理日志文件（避免误删其他文件）
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");
        if !file_name.ends_with(".log") && !file_name.starts_with(file_prefix) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .unwrap_or_else(|_| std::time::SystemTime::now());
        if modified >= cutoff {
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                deleted_count += 1;
                total_size_deleted += metadata.len();
                tracing::debug!("已删除过期日志: {}", path.display());
            }
            Err(e) => tracing::warn!("删除日志文件失败: {} - {}", path.display(), e),
        }
    }

    if deleted_count > 0 {
        tracing::info!(
            "已清理 {} 个过期日志文件，释放空间 {:.2} MB",
            deleted_count,
            total_size_deleted as f64 / (1024.0 * 1024.0)
        );
    }

    Ok(deleted_count)
}

/// 配置中的日志级别是否可识别
pub fn is_valid_level(level: &str) -> bool {
    matches!(
        level.to_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    )
}

fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

fn level_filter_to_str(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::OFF => "off",
        LevelFilter::ERROR => "error",
        LevelFilter::WARN => "warn",
        LevelFilter::INFO => "info",
        LevelFilter::DEBUG => "debug",
        LevelFilter::TRACE => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_defaults_to_info() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::DEBUG);
        assert_eq!(parse_level("verbose"), LevelFilter::INFO);
        assert!(is_valid_level("WARN"));
        assert!(!is_valid_level("verbose"));
    }

    #[test]
    fn test_cleanup_keeps_recent_and_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("receipt-manager-info.2024-01-01"), b"log").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        // 刚写入的文件不会被清理
        assert_eq!(cleanup_old_logs(dir.path(), "receipt-manager", 1).unwrap(), 0);
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(cleanup_old_logs(&dir.path().join("missing"), "x", 1).unwrap(), 0);
    }

    #[test]
    fn test_absolute_log_dir_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_log_dir(dir.path().to_str().unwrap()), dir.path());
    }
}
