//! 小票文本的轻量抽取：日期与商户名

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

pub const MAX_MERCHANT_LINE: usize = 200;
pub const MAX_MERCHANT_LEN: usize = 256;

/// 日期格式按 ISO、美式、欧式顺序尝试
#[derive(Debug, Clone, Copy)]
enum DateLayout {
    Iso,
    MonthFirst,
    DayFirst,
}

fn date_patterns() -> &'static [(Regex, DateLayout); 3] {
    static PATTERNS: OnceLock<[(Regex, DateLayout); 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                Regex::new(r"\b(20[0-9]{2})-([0-9]{1,2})-([0-9]{1,2})\b").unwrap(),
                DateLayout::Iso,
            ),
            (
                Regex::new(r"\b([0-9]{1,2})[/-]([0-9]{1,2})[/-](20[0-9]{2})\b").unwrap(),
                DateLayout::MonthFirst,
            ),
            (
                Regex::new(r"\b([0-9]{1,2})[./]([0-9]{1,2})[./](20[0-9]{2})\b").unwrap(),
                DateLayout::DayFirst,
            ),
        ]
    })
}

/// 从文本中找出第一个合法的小票日期。
///
/// 每种格式只看第一个匹配；匹配到的不是合法日历日期时继续尝试下一种格式。
pub fn parse_date_from_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }

    for (re, layout) in date_patterns() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let group = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let (Some(a), Some(b), Some(c)) = (group(1), group(2), group(3)) else {
            continue;
        };
        let date = match layout {
            DateLayout::Iso => NaiveDate::from_ymd_opt(a as i32, b, c),
            DateLayout::MonthFirst => NaiveDate::from_ymd_opt(c as i32, a, b),
            DateLayout::DayFirst => NaiveDate::from_ymd_opt(c as i32, b, a),
        };
        if date.is_some() {
            return date;
        }
    }
    None
}

fn bare_date_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(20[0-9]{2}[-/.][0-9]{1,2}[-/.][0-9]{1,2}|[0-9]{1,2}[-/.][0-9]{1,2}[-/.]20[0-9]{2})$",
        )
        .unwrap()
    })
}

fn amount_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9\s.,$€£]+$").unwrap())
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0B' | '\x0C' | '\x1C' | '\x1D' | '\x1E' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// 商户名：第一行既不是纯日期、也不是纯金额数字的文本
pub fn parse_merchant_from_text(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    text.split(is_line_break)
        .map(str::trim)
        .filter(|line| {
            let len = line.chars().count();
            (2..=MAX_MERCHANT_LINE).contains(&len)
        })
        .find(|line| !bare_date_line().is_match(line) && !amount_line().is_match(line))
        .map(|line| line.chars().take(MAX_MERCHANT_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_iso_date_wins_over_other_layouts() {
        let text = "Visit 03/04/2024\nPrinted 2024-01-15 10:22";
        assert_eq!(parse_date_from_text(text), ymd(2024, 1, 15));
    }

    #[test]
    fn test_us_layout_is_month_first() {
        assert_eq!(parse_date_from_text("DATE 03/04/2024"), ymd(2024, 3, 4));
        assert_eq!(parse_date_from_text("12-31-2023 total"), ymd(2023, 12, 31));
    }

    #[test]
    fn test_invalid_us_match_falls_through_to_day_first() {
        // 25/12 作为月/日无效，改按日/月解析
        assert_eq!(parse_date_from_text("25/12/2023"), ymd(2023, 12, 25));
        assert_eq!(parse_date_from_text("Datum 31.01.2024"), ymd(2024, 1, 31));
    }

    #[test]
    fn test_only_first_match_per_layout_is_considered() {
        // 第一个ISO匹配无效且后续格式都不匹配
        assert_eq!(parse_date_from_text("2024-13-40 then 2024-02-02"), None);
        assert_eq!(parse_date_from_text("2024-02-30"), None);
    }

    #[test]
    fn test_no_date() {
        assert_eq!(parse_date_from_text(""), None);
        assert_eq!(parse_date_from_text("TOTAL 12.50"), None);
        assert_eq!(parse_date_from_text("1999-01-01"), None);
    }

    #[test]
    fn test_merchant_skips_dates_amounts_and_short_lines() {
        let text = "\n  2024-01-15  \n$ 12.50\nX\n  Joe's Diner  \nTable 4";
        assert_eq!(parse_merchant_from_text(text).as_deref(), Some("Joe's Diner"));
    }

    #[test]
    fn test_merchant_skips_bare_dates_in_either_order() {
        let text = "15.01.2024\n01/15/2024\n€ 3,20\nBÄCKEREI MÜLLER";
        assert_eq!(
            parse_merchant_from_text(text).as_deref(),
            Some("BÄCKEREI MÜLLER")
        );
    }

    #[test]
    fn test_merchant_rejects_overlong_lines() {
        let long = "A".repeat(MAX_MERCHANT_LINE + 1);
        let text = format!("{}\nShort Shop", long);
        assert_eq!(parse_merchant_from_text(&text).as_deref(), Some("Short Shop"));
        assert_eq!(parse_merchant_from_text("1\n22\n3.3"), None);
        assert_eq!(parse_merchant_from_text(""), None);
    }

    #[test]
    fn test_merchant_handles_carriage_returns() {
        assert_eq!(
            parse_merchant_from_text("\r\nCAFE NERO\r\n2024-05-01").as_deref(),
            Some("CAFE NERO")
        );
    }
}
