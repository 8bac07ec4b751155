//! Static pages (about, privacy, ...).
use super::{map_write_error, merge_optional, slug_for_new, slug_for_update};
use crate::db::Pool;
use crate::error::{Result, SiteError};
use crate::scopes::{Audience, ContentQuery, Direction, Entity, Orderable, StatusFlagged};
use crate::slug::{SlugGenerator, Sluggable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Page {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub is_published: bool,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Page {
    const TABLE: &'static str = "pages";
    const NAME: &'static str = "page";
}

impl StatusFlagged for Page {}
impl Orderable for Page {}

impl Sluggable for Page {
    const SLUG_FALLBACK: &'static str = "page";
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPage {
    #[validate(length(min = 2, max = 255))]
    pub title: String,
    pub slug: Option<String>,
    pub content: String,
    #[validate(length(max = 255))]
    pub meta_title: Option<String>,
    #[validate(length(max = 500))]
    pub meta_description: Option<String>,
    #[serde(default = "default_true")]
    pub is_published: bool,
    #[serde(default)]
    pub order: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PageChanges {
    #[validate(length(min = 2, max = 255))]
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    #[validate(length(max = 255))]
    pub meta_title: Option<String>,
    #[validate(length(max = 500))]
    pub meta_description: Option<String>,
    pub is_published: Option<bool>,
    pub order: Option<i64>,
}

#[instrument(skip_all)]
pub async fn create(pool: &Pool, slugs: &SlugGenerator, mut input: NewPage) -> Result<Page> {
    input.title = input.title.trim().to_string();
    input.validate()?;
    let title = input.title.as_str();
    let slug = slug_for_new::<Page>(pool, slugs, input.slug.as_deref(), title).await?;
    let page = sqlx::query_as::<_, Page>(
        "INSERT INTO pages (title, slug, content, meta_title, meta_description, is_published, \"order\") \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(title)
    .bind(&slug)
    .bind(&input.content)
    .bind(&input.meta_title)
    .bind(&input.meta_description)
    .bind(input.is_published)
    .bind(input.order)
    .fetch_one(pool)
    .await
    .map_err(map_write_error)?;
    Ok(page)
}

#[instrument(skip(pool, slugs, changes))]
pub async fn update(
    pool: &Pool,
    slugs: &SlugGenerator,
    id: i64,
    mut changes: PageChanges,
) -> Result<Page> {
    changes.title = changes.title.map(|t| t.trim().to_string());
    changes.validate()?;
    let current: Page = super::find_by_id::<Page, Page>(pool, id).await?;
    let slug = slug_for_update::<Page>(pool, slugs, changes.slug.as_deref(), &current.slug).await?;
    let page = sqlx::query_as::<_, Page>(
        "UPDATE pages SET title = ?, slug = ?, content = ?, meta_title = ?, meta_description = ?, \
         is_published = ?, \"order\" = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ? RETURNING *",
    )
    .bind(changes.title.as_deref().unwrap_or(&current.title))
    .bind(&slug)
    .bind(changes.content.unwrap_or(current.content))
    .bind(merge_optional(changes.meta_title, current.meta_title))
    .bind(merge_optional(changes.meta_description, current.meta_description))
    .bind(changes.is_published.unwrap_or(current.is_published))
    .bind(changes.order.unwrap_or(current.order))
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(map_write_error)?;
    Ok(page)
}

pub async fn find_by_slug(pool: &Pool, slug: &str, audience: Audience) -> Result<Page> {
    ContentQuery::<Page>::new()
        .visible_to(audience)
        .where_eq("slug", slug)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SiteError::not_found(Page::NAME, slug))
}

pub async fn list(pool: &Pool, audience: Audience) -> Result<Vec<Page>> {
    ContentQuery::<Page>::new()
        .visible_to(audience)
        .ordered(Direction::Asc)
        .fetch_all(pool)
        .await
}

pub async fn delete(pool: &Pool, id: i64) -> Result<()> {
    super::delete::<Page>(pool, id).await
}
