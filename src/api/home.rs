//! 首页

use crate::db::ReceiptFilter;
use crate::util::report::PageRenderer;
use crate::util::session::PageContext;
use crate::util::ServerError;
use crate::AppState;
use axum::extract::State;
use axum::response::Html;
use tower_sessions::Session;

const RECENT_RECEIPTS: u32 = 5;

pub async fn index(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<Html<String>, ServerError> {
    let database = &app_state.database;
    let receipt_count = database.count_receipts().await?;
    let tag_count = database.list_tags().await?.len();
    let recent = database
        .list_receipts(&ReceiptFilter::default().with_limit(RECENT_RECEIPTS))
        .await?;

    let ctx = PageContext::load(&session).await?;
    Ok(Html(PageRenderer::home(&ctx, receipt_count, tag_count, &recent)))
}
