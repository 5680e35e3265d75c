//! 按标签（任一）、日期区间、商户/文本搜索

use crate::api::utils::SearchParams;
use crate::util::report::PageRenderer;
use crate::util::session::PageContext;
use crate::util::ServerError;
use crate::AppState;
use axum::extract::{RawQuery, State};
use axum::response::Html;
use tower_sessions::Session;
use tracing::debug;

pub async fn index(
    State(app_state): State<AppState>,
    RawQuery(query): RawQuery,
    session: Session,
) -> Result<Html<String>, ServerError> {
    let params = SearchParams::from_query(query.as_deref());
    let filter = params.to_filter();
    let receipts = app_state.database.list_receipts(&filter).await?;
    let all_tags = app_state.database.list_tags().await?;
    debug!(
        tags = params.tag_ids.len(),
        date_from = ?filter.date_from,
        date_to = ?filter.date_to,
        merchant = filter.merchant.is_some(),
        results = receipts.len(),
        "搜索完成"
    );

    let ctx = PageContext::load(&session).await?;
    Ok(Html(PageRenderer::search(&ctx, &receipts, &all_tags, &params)))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::*;
    use crate::db::{NewReceipt, ReceiptMeta};
    use axum::http::StatusCode;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_search_filters_by_tag_date_and_merchant() {
        let app = TestApp::new().await;
        let db = &app.state.database;
        let food = db.create_tag("food").await.unwrap();
        let travel = db.create_tag("travel").await.unwrap();

        let mut ids = Vec::new();
        for (name, merchant, date) in [
            ("a.png", "Corner Cafe", (2024, 1, 10)),
            ("b.png", "Airline", (2024, 2, 15)),
            ("c.png", "Bookshop", (2024, 3, 20)),
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
                    merchant: Some(merchant.into()),
                },
            )
            .await
            .unwrap();
            ids.push(r.id);
        }
        db.attach_tag(ids[0], food.id).await.unwrap();
        db.attach_tag(ids[1], travel.id).await.unwrap();

        let response = app
            .get(&format!("/search/?tag_id={}&tag_id={}", food.id, travel.id))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("2 results"));
        assert!(html.contains("a.png") && html.contains("b.png"));
        assert!(!html.contains(">c.png<"));

        let html = body_string(app.get("/search/?date_from=2024-02-01&date_to=2024-02-29").await).await;
        assert!(html.contains("1 result<"));
        assert!(html.contains("Airline"));

        let html = body_string(app.get("/search/?merchant=cafe&date_from=bogus").await).await;
        assert!(html.contains("1 result<"));
        assert!(html.contains("Corner Cafe"));
        assert!(html.contains("value=\"bogus\""));

        let html = body_string(app.get("/search/").await).await;
        assert!(html.contains("3 results"));
    }
}
