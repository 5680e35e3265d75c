//! 统计报告：按月或按标签计数，HTML 或 CSV 输出

use crate::api::export::csv_attachment;
use crate::api::utils::query_param;
use crate::db::ReceiptFilter;
use crate::util::logging::standards::events;
use crate::util::report::csv::report_to_csv;
use crate::util::report::{build_report, PageRenderer, ReportFormat, ReportKind};
use crate::util::session::PageContext;
use crate::util::ServerError;
use crate::AppState;
use axum::extract::{RawQuery, State};
use axum::response::{Html, IntoResponse, Response};
use tower_sessions::Session;
use tracing::info;

pub async fn index(
    State(app_state): State<AppState>,
    RawQuery(query): RawQuery,
    session: Session,
) -> Result<Response, ServerError> {
    let query = query.as_deref();
    let Some(kind) = ReportKind::parse(&query_param(query, "type")) else {
        let ctx = PageContext::load(&session).await?;
        return Ok(Html(PageRenderer::reports(&ctx, None, "", "")).into_response());
    };
    let date_from = query_param(query, "date_from");
    let date_to = query_param(query, "date_to");
    let format = ReportFormat::parse(&query_param(query, "format"));

    let filter = ReceiptFilter::from_params(&[], &date_from, &date_to, "");
    let receipts = app_state.database.list_receipts(&filter).await?;
    let report = build_report(&receipts, kind);
    info!(
        event = events::REPORT_GENERATED,
        kind = kind.as_str(),
        receipts = receipts.len(),
        rows = report.rows.len(),
        "生成统计报告"
    );

    match format {
        ReportFormat::Csv => Ok(csv_attachment(report_to_csv(&report)?, &kind.csv_filename())),
        ReportFormat::Html => {
            let ctx = PageContext::load(&session).await?;
            Ok(Html(PageRenderer::reports(&ctx, Some(&report), &date_from, &date_to)).into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::*;
    use crate::db::{NewReceipt, ReceiptMeta};
    use axum::http::{header, StatusCode};
    use chrono::NaiveDate;

    async fn seed(app: &TestApp) {
        let db = &app.state.database;
        let food = db.create_tag("food").await.unwrap();
        let travel = db.create_tag("travel").await.unwrap();
        for (name, date, tags) in [
            ("a.png", (2024, 1, 5), vec![food.id]),
            ("b.png", (2024, 1, 25), vec![food.id, travel.id]),
            ("c.png", (2024, 3, 2), vec![]),
        ] {
            let r = db
                .insert_receipt(&NewReceipt {
                    file_path: name.into(),
                    original_filename: name.into(),
                })
                .await
                .unwrap();
            db.update_receipt_meta(
                r.id,
                &ReceiptMeta {
                    extracted_text: None,
                    receipt_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
                    merchant: None,
                },
            )
            .await
            .unwrap();
            for tag_id in tags {
                db.attach_tag(r.id, tag_id).await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_type_renders_empty_page() {
        let app = TestApp::new().await;
        let response = app.get("/reports/?type=by_year").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!body_string(response).await.contains("Download CSV"));
    }

    #[tokio::test]
    async fn test_by_month_html_and_csv() {
        let app = TestApp::new().await;
        seed(&app).await;

        let html = body_string(app.get("/reports/?type=by_month").await).await;
        assert!(html.contains("<td>2024-01</td><td>2</td>"));
        assert!(html.contains("<td>2024-03</td><td>1</td>"));

        let response = app
            .get("/reports/?type=by_month&date_from=2024-02-01&format=csv")
            .await;
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=report_by_month.csv"
        );
        assert_eq!(body_string(response).await, "month,count\r\n2024-03,1\r\n");
    }

    #[tokio::test]
    async fn test_by_tag_csv_ordering() {
        let app = TestApp::new().await;
        seed(&app).await;

        let response = app.get("/reports/?type=by_tag&format=CSV").await;
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=report_by_tag.csv"
        );
        assert_eq!(
            body_string(response).await,
            "tag,count\r\nfood,2\r\ntravel,1\r\n"
        );
    }
}
