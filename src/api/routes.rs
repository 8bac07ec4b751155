use super::response::{ok, ok_with_message};
use super::AppState;
use crate::contact::{self, ContactForm};
use crate::content::{news, pages, services, sliders, NewsFilter, Pagination};
use crate::error::{Result, SiteError};
use crate::scopes::Audience;
use crate::settings::SettingGroup;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub featured: Option<bool>,
}

pub async fn news_index(
    State(state): State<AppState>,
    query: std::result::Result<Query<NewsQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(q) = query.map_err(|e| SiteError::invalid("query", e.body_text()))?;
    let page = Pagination::new(
        q.page,
        q.per_page,
        state.content.news_per_page,
        state.content.max_per_page,
    );
    let filter = NewsFilter { featured: q.featured };
    let result = news::list(&state.pool, Audience::Public, filter, page).await?;
    Ok(ok(result))
}

pub async fn news_show(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Response> {
    let item = news::find_by_slug(&state.pool, &slug, Audience::Public).await?;
    Ok(ok(item))
}

pub async fn pages_index(State(state): State<AppState>) -> Result<Response> {
    Ok(ok(pages::list(&state.pool, Audience::Public).await?))
}

pub async fn pages_show(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Response> {
    Ok(ok(pages::find_by_slug(&state.pool, &slug, Audience::Public).await?))
}

pub async fn services_index(State(state): State<AppState>) -> Result<Response> {
    Ok(ok(services::list(&state.pool, Audience::Public).await?))
}

pub async fn services_show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response> {
    Ok(ok(services::find_by_slug(&state.pool, &slug, Audience::Public).await?))
}

pub async fn sliders_index(State(state): State<AppState>) -> Result<Response> {
    Ok(ok(sliders::list(&state.pool, Audience::Public).await?))
}

pub async fn settings_index(State(state): State<AppState>) -> Result<Response> {
    Ok(ok(state.settings.all().await?))
}

pub async fn settings_group(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Response> {
    let group =
        SettingGroup::parse(&group).ok_or_else(|| SiteError::not_found("settings group", &group))?;
    Ok(ok(state.settings.by_group(group).await?))
}

pub async fn contact_store(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ContactForm>, JsonRejection>,
) -> Result<Response> {
    let Json(form) = payload.map_err(|e| SiteError::invalid("body", e.body_text()))?;
    let saved = contact::submit(&state.pool, form).await?;
    Ok(ok_with_message(
        json!({ "id": saved.id }),
        Some("تم إرسال رسالتك بنجاح، سنتواصل معك قريباً"),
    ))
}

pub async fn fallback() -> SiteError {
    SiteError::not_found("route", "unknown path")
}
