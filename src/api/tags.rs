//! 标签：列表、创建、重命名、删除

use crate::api::utils::require_csrf;
use crate::db::MAX_TAG_NAME_LEN;
use crate::util::logging::standards::events;
use crate::util::report::PageRenderer;
use crate::util::session::{flash_error, flash_success, PageContext};
use crate::util::ServerError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::{Html, Redirect};
use axum::Form;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

const TAGS_PATH: &str = "/tags/";

#[derive(Debug, Deserialize)]
pub struct TagForm {
    csrf_token: Option<String>,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    csrf_token: Option<String>,
}

/// 校验标签名；`exclude_id` 为重命名时的自身 id
async fn validate_name(
    app_state: &AppState,
    name: &str,
    exclude_id: Option<i64>,
) -> anyhow::Result<Result<(), String>> {
    if name.is_empty() {
        return Ok(Err("Tag name is required.".to_string()));
    }
    if name.chars().count() > MAX_TAG_NAME_LEN {
        return Ok(Err("Tag name too long.".to_string()));
    }
    if let Some(existing) = app_state.database.find_tag_by_name(name).await? {
        if Some(existing.id) != exclude_id {
            return Ok(Err(format!("Tag «{}» already exists.", name)));
        }
    }
    Ok(Ok(()))
}

pub async fn index(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<Html<String>, ServerError> {
    let tags = app_state.database.list_tags().await?;
    let ctx = PageContext::load(&session).await?;
    Ok(Html(PageRenderer::tags_index(&ctx, &tags)))
}

pub async fn create(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<TagForm>,
) -> Result<Redirect, ServerError> {
    require_csrf(&session, form.csrf_token.as_deref(), "/tags/create").await?;
    let name = form.name.trim();

    if let Err(message) = validate_name(&app_state, name, None).await? {
        flash_error(&session, message).await?;
        return Ok(Redirect::to(TAGS_PATH));
    }

    let tag = app_state.database.create_tag(name).await?;
    info!(event = events::TAG_CREATED, tag_id = tag.id, name = %tag.name, "标签已创建");
    flash_success(&session, format!("Tag «{}» created.", tag.name)).await?;
    Ok(Redirect::to(TAGS_PATH))
}

pub async fn edit_form(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    session: Session,
) -> Result<Html<String>, ServerError> {
    let tag = app_state
        .database
        .get_tag(id)
        .await?
        .ok_or(ServerError::NotFound)?;
    let ctx = PageContext::load(&session).await?;
    Ok(Html(PageRenderer::tag_edit(&ctx, &tag)))
}

pub async fn edit(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    session: Session,
    Form(form): Form<TagForm>,
) -> Result<Redirect, ServerError> {
    let tag = app_state
        .database
        .get_tag(id)
        .await?
        .ok_or(ServerError::NotFound)?;
    let edit_path = format!("/tags/{}/edit", id);
    require_csrf(&session, form.csrf_token.as_deref(), &edit_path).await?;
    let name = form.name.trim();

    if let Err(message) = validate_name(&app_state, name, Some(id)).await? {
        flash_error(&session, message).await?;
        return Ok(Redirect::to(&edit_path));
    }

    app_state.database.rename_tag(id, name).await?;
    info!(event = events::TAG_RENAMED, tag_id = id, from = %tag.name, to = %name, "标签已重命名");
    flash_success(&session, format!("Tag renamed to «{}».", name)).await?;
    Ok(Redirect::to(TAGS_PATH))
}

pub async fn delete(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    session: Session,
    Form(form): Form<DeleteForm>,
) -> Result<Redirect, ServerError> {
    let tag = app_state
        .database
        .get_tag(id)
        .await?
        .ok_or(ServerError::NotFound)?;
    require_csrf(&session, form.csrf_token.as_deref(), &format!("/tags/{}/delete", id)).await?;

    if app_state.database.delete_tag(id).await? {
        info!(event = events::TAG_DELETED, tag_id = id, name = %tag.name, "标签已删除");
        flash_success(&session, format!("Tag «{}» deleted.", tag.name)).await?;
    }
    Ok(Redirect::to(TAGS_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use crate::db::NewReceipt;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_create_validation_messages() {
        let app = TestApp::new().await;

        let response = app.post_form("/tags/create", &[("name", "  Food  ")]).await;
        assert_eq!(location(&response), TAGS_PATH);
        let html = app.follow(response).await;
        assert!(html.contains("Tag «Food» created."));
        assert!(html.contains("<span class=\"tag\">Food</span>"));

        let response = app.post_form("/tags/create", &[("name", "   ")]).await;
        assert!(app.follow(response).await.contains("Tag name is required."));

        let long = "x".repeat(MAX_TAG_NAME_LEN + 1);
        let response = app.post_form("/tags/create", &[("name", long.as_str())]).await;
        assert!(app.follow(response).await.contains("Tag name too long."));

        let exact = "y".repeat(MAX_TAG_NAME_LEN);
        let response = app.post_form("/tags/create", &[("name", exact.as_str())]).await;
        assert!(app.follow(response).await.contains("created."));

        let response = app.post_form("/tags/create", &[("name", "Food")]).await;
        assert!(app.follow(response).await.contains("Tag «Food» already exists."));

        assert_eq!(app.state.database.list_tags().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rename_excludes_self_from_duplicate_check() {
        let app = TestApp::new().await;
        let food = app.state.database.create_tag("food").await.unwrap();
        app.state.database.create_tag("travel").await.unwrap();
        let url = format!("/tags/{}/edit", food.id);

        let response = app.get(&url).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("value=\"food\""));

        let response = app.post_form(&url, &[("name", "food")]).await;
        assert_eq!(location(&response), TAGS_PATH);
        assert!(app.follow(response).await.contains("Tag renamed to «food»."));

        let response = app.post_form(&url, &[("name", "travel")]).await;
        assert_eq!(location(&response), url);
        assert!(app.follow(response).await.contains("Tag «travel» already exists."));

        let response = app.post_form(&url, &[("name", "groceries")]).await;
        assert!(app.follow(response).await.contains("Tag renamed to «groceries»."));
        let renamed = app.state.database.get_tag(food.id).await.unwrap().unwrap();
        assert_eq!(renamed.name, "groceries");

        assert_eq!(app.get("/tags/999/edit").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_detaches_from_receipts() {
        let app = TestApp::new().await;
        let db = &app.state.database;
        let tag = db.create_tag("food").await.unwrap();
        let receipt = db
            .insert_receipt(&NewReceipt {
                file_path: "a.png".into(),
                original_filename: "a.png".into(),
            })
            .await
            .unwrap();
        db.attach_tag(receipt.id, tag.id).await.unwrap();

        let response = app.post_form(&format!("/tags/{}/delete", tag.id), &[]).await;
        assert!(app.follow(response).await.contains("Tag «food» deleted."));
        assert!(db.get_tag(tag.id).await.unwrap().is_none());
        assert!(db.get_receipt(receipt.id).await.unwrap().unwrap().tags.is_empty());

        let response = app.post_form(&format!("/tags/{}/delete", tag.id), &[]).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
