//! 构建信息（由 build.rs 注入）

pub const BUILD_VERSION: &str = env!("APP_BUILD_VERSION");
pub const BUILD_COMMIT: &str = env!("APP_BUILD_COMMIT");
pub const BUILD_TIMESTAMP: &str = env!("APP_BUILD_TIMESTAMP");

/// 版本摘要：Cargo 版本 + 构建元数据，用于健康检查
pub fn summary() -> String {
    format!(
        "{} (build {}, commit {}, built at {})",
        env!("CARGO_PKG_VERSION"),
        BUILD_VERSION,
        BUILD_COMMIT,
        BUILD_TIMESTAMP
    )
}

/// 命令行 `--version` 输出
pub fn version_line(binary: &str) -> String {
    format!("{} {} ({})", binary, env!("CARGO_PKG_VERSION"), BUILD_COMMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_strings() {
        assert!(summary().starts_with(env!("CARGO_PKG_VERSION")));
        assert!(version_line("receipt-manager").starts_with("receipt-manager "));
    }
}
