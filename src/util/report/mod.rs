//! 报告与页面渲染模块
//!
//! - 统计报告（按月 / 按标签）(mod.rs)
//! - CSV 导出 (csv.rs)
//! - HTML 页面 (html.rs)
//! - CSS 样式 (styles.rs)
//! - 页面布局与转义工具 (template.rs)

pub mod csv;
pub mod html;
pub mod styles;
pub mod template;

pub use html::PageRenderer;

use crate::db::ReceiptRecord;
use std::collections::{BTreeMap, HashMap};

/// 报告类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    ByMonth,
    ByTag,
}

impl ReportKind {
    /// 未知类型返回 None
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "by_month" => Some(Self::ByMonth),
            "by_tag" => Some(Self::ByTag),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ByMonth => "by_month",
            Self::ByTag => "by_tag",
        }
    }

    /// 第一列的列名
    pub fn key_column(&self) -> &'static str {
        match self {
            Self::ByMonth => "month",
            Self::ByTag => "tag",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::ByMonth => "By month",
            Self::ByTag => "By tag",
        }
    }

    pub fn csv_filename(&self) -> String {
        format!("report_{}.csv", self.as_str())
    }
}

/// 输出格式，默认 HTML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Html,
    Csv,
}

impl ReportFormat {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("csv") {
            Self::Csv
        } else {
            Self::Html
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub kind: ReportKind,
    pub rows: Vec<ReportRow>,
}

/// 汇总统计
///
/// 按月：以有效日期分桶，月份升序；
/// 按标签：计数降序，同数按名称升序，无标签的小票不计入。
pub fn build_report(receipts: &[ReceiptRecord], kind: ReportKind) -> Report {
    let rows = match kind {
        ReportKind::ByMonth => {
            let mut buckets: BTreeMap<String, usize> = BTreeMap::new();
            for receipt in receipts {
                let month = receipt.effective_date().format("%Y-%m").to_string();
                *buckets.entry(month).or_default() += 1;
            }
            buckets
                .into_iter()
                .map(|(key, count)| ReportRow { key, count })
                .collect()
        }
        ReportKind::ByTag => {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for receipt in receipts {
                for tag in &receipt.tags {
                    *counts.entry(tag.name.as_str()).or_default() += 1;
                }
            }
            let mut rows: Vec<ReportRow> = counts
                .into_iter()
                .map(|(key, count)| ReportRow {
                    key: key.to_string(),
                    count,
                })
                .collect();
            rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
            rows
        }
    };

    Report { kind, rows }
}


#[cfg(test)]
mod tests {
    use super::test_support::receipt;
    use super::*;

    #[test]
    fn test_report_kind_parse() {
        assert_eq!(ReportKind::parse("by_month"), Some(ReportKind::ByMonth));
        assert_eq!(ReportKind::parse(" by_tag "), Some(ReportKind::ByTag));
        assert_eq!(ReportKind::parse("by_year"), None);
        assert_eq!(ReportKind::parse(""), None);
        assert_eq!(ReportKind::ByTag.csv_filename(), "report_by_tag.csv");
        assert_eq!(ReportFormat::parse("CSV"), ReportFormat::Csv);
        assert_eq!(ReportFormat::parse("pdf"), ReportFormat::Html);
    }

    #[test]
    fn test_by_month_uses_effective_date_sorted_ascending() {
        let receipts = vec![
            receipt(1, (2024, 3, 2), None, &[]),
            receipt(2, (2024, 3, 9), Some((2023, 12, 24)), &[]),
            receipt(3, (2024, 1, 15), None, &[]),
            receipt(4, (2024, 3, 20), None, &[]),
        ];
        let report = build_report(&receipts, ReportKind::ByMonth);
        let rows: Vec<(&str, usize)> = report.rows.iter().map(|r| (r.key.as_str(), r.count)).collect();
        assert_eq!(rows, vec![("2023-12", 1), ("2024-01", 1), ("2024-03", 2)]);
        assert_eq!(report.rows.iter().map(|r| r.count).sum::<usize>(), 4);
    }

    #[test]
    fn test_by_tag_sorted_by_count_then_name() {
        let receipts = vec![
            receipt(1, (2024, 3, 2), None, &["travel", "food"]),
            receipt(2, (2024, 3, 3), None, &["food"]),
            receipt(3, (2024, 3, 4), None, &["office"]),
            receipt(4, (2024, 3, 5), None, &[]),
        ];
        let report = build_report(&receipts, ReportKind::ByTag);
        let rows: Vec<(&str, usize)> = report.rows.iter().map(|r| (r.key.as_str(), r.count)).collect();
        assert_eq!(rows, vec![("food", 2), ("office", 1), ("travel", 1)]);
    }

    #[test]
    fn test_empty_input_yields_no_rows() {
        assert!(build_report(&[], ReportKind::ByMonth).rows.is_empty());
        assert!(build_report(&[], ReportKind::ByTag).rows.is_empty());
    }
}
