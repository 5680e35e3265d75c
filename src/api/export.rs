//! CSV 导出（与搜索使用相同的过滤参数）

use crate::api::utils::SearchParams;
use crate::util::logging::standards::events;
use crate::util::report::csv::{receipts_to_csv, RECEIPTS_CSV_FILENAME};
use crate::util::ServerError;
use crate::AppState;
use axum::extract::{RawQuery, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::info;

/// 以附件形式返回 CSV
pub(crate) fn csv_attachment(body: String, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            ),
        ],
        body,
    )
        .into_response()
}

pub async fn receipts_csv(
    State(app_state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ServerError> {
    let params = SearchParams::from_query(query.as_deref());
    let receipts = app_state.database.list_receipts(&params.to_filter()).await?;
    let body = receipts_to_csv(&receipts)?;
    info!(event = events::EXPORT_CSV, rows = receipts.len(), "导出CSV");
    Ok(csv_attachment(body, RECEIPTS_CSV_FILENAME))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::*;
    use crate::db::NewReceipt;
    use axum::http::{header, StatusCode};

    #[tokio::test]
    async fn test_export_uses_search_filters() {
        let app = TestApp::new().await;
        let db = &app.state.database;
        let tag = db.create_tag("food").await.unwrap();
        for name in ["a.png", "b.png"] {
            let r = db
                .insert_receipt(&NewReceipt {
                    file_path: name.into(),
                    original_filename: name.into(),
                })
                .await
                .unwrap();
            if name == "a.png" {
                db.attach_tag(r.id, tag.id).await.unwrap();
            }
        }

        let response = app.get(&format!("/export/receipts.csv?tag_id={}", tag.id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=receipts.csv"
        );
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv"));
        let body = body_string(response).await;
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "date,merchant,tags,filename,created_at");
        assert!(lines[1].contains(",food,a.png,"));

        let all = body_string(app.get("/export/receipts.csv").await).await;
        assert_eq!(all.lines().count(), 3);
    }
}
