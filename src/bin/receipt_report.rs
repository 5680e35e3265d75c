//! 命令行报表：按月或按标签统计小票，CSV 输出到标准输出
//!
//! 用法: receipt-report <by_month|by_tag> [--from YYYY-MM-DD] [--to YYYY-MM-DD]

use anyhow::{anyhow, Context, Result};

use receipt_manager::build_info;
use receipt_manager::db::ReceiptFilter;
use receipt_manager::server::{ConfigManager, DatabaseInitializer};
use receipt_manager::util::report::csv::report_to_csv;
use receipt_manager::util::report::{build_report, ReportKind};

const USAGE: &str = "用法: receipt-report <by_month|by_tag> [--from YYYY-MM-DD] [--to YYYY-MM-DD]";

#[derive(Debug, PartialEq)]
struct ReportArgs {
    kind: ReportKind,
    date_from: String,
    date_to: String,
}

fn parse_args<I>(args: I) -> Result<ReportArgs>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let kind_arg = args.next().ok_or_else(|| anyhow!("缺少报表类型\n{}", USAGE))?;
    let kind = ReportKind::parse(&kind_arg)
        .ok_or_else(|| anyhow!("未知报表类型: {}\n{}", kind_arg, USAGE))?;

    let mut date_from = String::new();
    let mut date_to = String::new();
    while let Some(flag) = args.next() {
        let target = match flag.as_str() {
            "--from" => &mut date_from,
            "--to" => &mut date_to,
            other => return Err(anyhow!("未知参数: {}\n{}", other, USAGE)),
        };
        *target = args
            .next()
            .ok_or_else(|| anyhow!("{} 缺少日期参数", flag))?;
    }

    Ok(ReportArgs {
        kind,
        date_from,
        date_to,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.first().map(String::as_str) == Some("--version") {
        println!("{}", build_info::version_line("receipt-report"));
        return Ok(());
    }
    let args = parse_args(raw)?;

    // 标准输出只写 CSV，因此不初始化控制台日志
    let (config, validation) =
        ConfigManager::load_and_validate().context("加载配置文件失败，无法生成报表")?;
    if validation.has_errors() {
        return Err(anyhow!(
            "配置验证失败，共 {} 个错误，请先修复配置",
            validation.error_count()
        ));
    }

    let database = DatabaseInitializer::create_from_config(&config)
        .await
        .context("初始化数据库失败")?;

    let filter = ReceiptFilter::from_params(&[], &args.date_from, &args.date_to, "");
    let receipts = database
        .list_receipts(&filter)
        .await
        .context("查询小票失败")?;

    let report = build_report(&receipts, args.kind);
    print!("{}", report_to_csv(&report)?);
    eprintln!(
        "[ok] 报表生成完成: {}（小票数：{}，行数：{}）",
        args.kind.as_str(),
        receipts.len(),
        report.rows.len()
    );
    Ok(())
}
