//! API工具函数模块
//! 查询参数解析与表单校验等处理函数共用的工具

use tower_sessions::Session;
use tracing::warn;

use crate::db::ReceiptFilter;
use crate::util::logging::standards::events;
use crate::util::session::verify_csrf;
use crate::util::ServerError;

/// 搜索 / 导出共用的查询参数（保留原始字符串用于表单回显）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub tag_ids: Vec<i64>,
    pub date_from: String,
    pub date_to: String,
    pub merchant: String,
}

impl SearchParams {
    /// 解析查询串；`tag_id` 可重复，无法解析为整数的值丢弃；
    /// 其余字段重复出现时取首个值
    pub fn from_query(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(query) = query else {
            return params;
        };
        let mut date_from = None;
        let mut date_to = None;
        let mut merchant = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "tag_id" => {
                    if let Ok(id) = value.trim().parse::<i64>() {
                        params.tag_ids.push(id);
                    }
                    continue;
                }
                "date_from" => &mut date_from,
                "date_to" => &mut date_to,
                "merchant" => &mut merchant,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.trim().to_string());
            }
        }
        params.date_from = date_from.unwrap_or_default();
        params.date_to = date_to.unwrap_or_default();
        params.merchant = merchant.unwrap_or_default();
        params
    }

    pub fn to_filter(&self) -> ReceiptFilter {
        ReceiptFilter::from_params(&self.tag_ids, &self.date_from, &self.date_to, &self.merchant)
    }

    /// 重新编码为查询串，用于导出链接
    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for id in &self.tag_ids {
            serializer.append_pair("tag_id", &id.to_string());
        }
        for (key, value) in [
            ("date_from", &self.date_from),
            ("date_to", &self.date_to),
            ("merchant", &self.merchant),
        ] {
            if !value.is_empty() {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }
}

/// 取单个查询参数（首个出现的值，已去空白）
pub fn query_param(query: Option<&str>, name: &str) -> String {
    query
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.trim().to_string())
        })
        .unwrap_or_default()
}

/// POST 表单 CSRF 校验，失败返回 400
pub async fn require_csrf(session: &Session, token: Option<&str>, path: &str) -> Result<(), ServerError> {
    if verify_csrf(session, token).await? {
        return Ok(());
    }
    warn!(event = events::CSRF_REJECTED, path = %path, "CSRF令牌校验失败");
    Err(ServerError::BadRequest(
        "The CSRF token is missing or invalid.".to_string(),
    ))
}

/// 解析可选整数表单字段
pub fn parse_form_id(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_search_params_repeated_tags() {
        let params = SearchParams::from_query(Some(
            "tag_id=2&tag_id=x&tag_id=5&date_from=2024-01-01&date_to=&merchant=+Cafe%20Uno+",
        ));
        assert_eq!(params.tag_ids, vec![2, 5]);
        assert_eq!(params.date_from, "2024-01-01");
        assert_eq!(params.date_to, "");
        assert_eq!(params.merchant, "Cafe Uno");

        let filter = params.to_filter();
        assert_eq!(filter.date_from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(filter.date_to, None);
        assert_eq!(filter.merchant.as_deref(), Some("Cafe Uno"));
    }

    #[test]
    fn test_repeated_fields_keep_first_value() {
        let params = SearchParams::from_query(Some(
            "date_from=2024-01-01&date_from=2025-01-01&merchant=&merchant=Cafe&date_to=2024-06-30&date_to=2023-01-01",
        ));
        assert_eq!(params.date_from, "2024-01-01");
        assert_eq!(params.date_to, "2024-06-30");
        assert_eq!(params.merchant, "");
        assert_eq!(
            params.date_from,
            query_param(Some("date_from=2024-01-01&date_from=2025-01-01"), "date_from")
        );
    }

    #[test]
    fn test_query_string_roundtrip() {
        let params = SearchParams {
            tag_ids: vec![1, 3],
            date_from: String::new(),
            date_to: "2024-12-31".into(),
            merchant: "a&b".into(),
        };
        let qs = params.to_query_string();
        assert_eq!(qs, "tag_id=1&tag_id=3&date_to=2024-12-31&merchant=a%26b");
        assert_eq!(SearchParams::from_query(Some(&qs)), params);
        assert_eq!(SearchParams::from_query(None), SearchParams::default());
    }

    #[test]
    fn test_query_param_and_form_id() {
        assert_eq!(query_param(Some("type=by_tag&format=csv"), "format"), "csv");
        assert_eq!(query_param(None, "type"), "");
        assert_eq!(parse_form_id(Some(" 7 ")), Some(7));
        assert_eq!(parse_form_id(Some("seven")), None);
        assert_eq!(parse_form_id(None), None);
    }
}
