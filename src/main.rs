use std::io::Write;

use receipt_manager::{build_info, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s
        } else {
            "Unknown panic payload"
        };

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "Unknown location".to_string());

        eprintln!("[PANIC] 程序异常退出");
        eprintln!("位置: {}", location);
        eprintln!("原因: {}", message);
        tracing::error!(event = "panic.raised", location = %location, reason = %message);

        let panic_msg = format!(
            "PANIC\nLocation: {}\nReason: {}\nTime: {}\n",
            location,
            message,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        if let Err(e) = std::fs::write("./panic.log", &panic_msg) {
            eprintln!("[WARN] 无法写入panic.log: {}", e);
        }

        std::io::stderr().flush().ok();
    }));

    let mut args = std::env::args();
    let _ = args.next();

    match args.next().as_deref() {
        Some("--version") | Some("-V") => {
            println!("{}", build_info::version_line("receipt-manager"));
            Ok(())
        }
        Some("health-check") | Some("--health-check") => {
            let report = server::check_system_health().await?;
            println!(
                "健康检查 [{}]: overall={}, db={}, storage={}",
                report.check_time.format("%Y-%m-%d %H:%M:%S UTC"),
                report.overall_healthy,
                report.database_health.is_healthy,
                report.storage_health.is_healthy
            );
            for warning in &report.validation_warnings {
                println!("  警告: {}", warning);
            }
            if !report.overall_healthy {
                std::process::exit(1);
            }
            Ok(())
        }
        Some("serve") | None => server::start_server().await,
        Some(other) => {
            eprintln!("未知命令: {}", other);
            eprintln!("用法: receipt-manager [serve | health-check | --version]");
            std::process::exit(2);
        }
    }
}
