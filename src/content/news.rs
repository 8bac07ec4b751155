//! News articles.
//!
//! Publicly visible only when published *and* the publication time has
//! passed, so editors can schedule articles ahead of time.

use super::{
    map_write_error, merge_optional, paginate, slug_for_new, slug_for_update, Paginated, Pagination,
};
use crate::db::Pool;
use crate::error::{Result, SiteError};
use crate::scopes::{Audience, ContentQuery, Direction, Entity, Orderable, StatusFlagged};
use crate::slug::{SlugGenerator, Sluggable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::{info, instrument};
use validator::Validate;

const RELEASED: &str = "published_at IS NOT NULL AND datetime(published_at) <= datetime('now')";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct News {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub image: Option<String>,
    pub is_published: bool,
    pub is_featured: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub views: i64,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for News {
    const TABLE: &'static str = "news";
    const NAME: &'static str = "news";
}

impl StatusFlagged for News {}
impl Orderable for News {}

impl Sluggable for News {
    const SLUG_FALLBACK: &'static str = "news";
}

impl News {
    /// Published and released as of now.
    pub fn is_public(&self) -> bool {
        self.is_published && self.published_at.is_some_and(|at| at <= Utc::now())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewNews {
    #[validate(length(min = 3, max = 255, message = "العنوان يجب أن يكون بين 3 و 255 حرفاً"))]
    pub title: String,
    pub slug: Option<String>,
    #[validate(length(max = 500))]
    pub excerpt: Option<String>,
    pub content: String,
    pub image: Option<String>,
    pub is_published: bool,
    pub is_featured: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub order: i64,
}

/// Partial edit; `None` leaves the column as is, a blank string clears an
/// optional one.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewsChanges {
    #[validate(length(min = 3, max = 255, message = "العنوان يجب أن يكون بين 3 و 255 حرفاً"))]
    pub title: Option<String>,
    pub slug: Option<String>,
    #[validate(length(max = 500))]
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub is_published: Option<bool>,
    pub is_featured: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NewsFilter {
    pub featured: Option<bool>,
}

fn visible(audience: Audience) -> ContentQuery<News> {
    let query = ContentQuery::<News>::new().visible_to(audience);
    match audience {
        Audience::Public => query.where_raw(RELEASED),
        Audience::Privileged => query,
    }
}

/// Publishing without a date means "now".
fn effective_published_at(
    is_published: bool,
    published_at: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (is_published, published_at) {
        (true, None) => Some(Utc::now()),
        (_, at) => at,
    }
}

#[instrument(skip_all)]
pub async fn create(pool: &Pool, slugs: &SlugGenerator, mut input: NewNews) -> Result<News> {
    input.title = input.title.trim().to_string();
    input.validate()?;
    let title = input.title.as_str();
    let slug = slug_for_new::<News>(pool, slugs, input.slug.as_deref(), title).await?;
    let published_at = effective_published_at(input.is_published, input.published_at);

    let news = sqlx::query_as::<_, News>(
        "INSERT INTO news (title, slug, excerpt, content, image, is_published, is_featured, published_at, \"order\") \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(title)
    .bind(&slug)
    .bind(&input.excerpt)
    .bind(&input.content)
    .bind(&input.image)
    .bind(input.is_published)
    .bind(input.is_featured)
    .bind(published_at)
    .bind(input.order)
    .fetch_one(pool)
    .await
    .map_err(map_write_error)?;

    info!(id = news.id, slug = %news.slug, "news created");
    Ok(news)
}

#[instrument(skip(pool, slugs, changes))]
pub async fn update(
    pool: &Pool,
    slugs: &SlugGenerator,
    id: i64,
    mut changes: NewsChanges,
) -> Result<News> {
    changes.title = changes.title.map(|t| t.trim().to_string());
    changes.validate()?;
    let current = find(pool, id).await?;
    let slug = slug_for_update::<News>(pool, slugs, changes.slug.as_deref(), &current.slug).await?;

    let is_published = changes.is_published.unwrap_or(current.is_published);
    let published_at =
        effective_published_at(is_published, changes.published_at.or(current.published_at));

    let news = sqlx::query_as::<_, News>(
        "UPDATE news SET title = ?, slug = ?, excerpt = ?, content = ?, image = ?, is_published = ?, \
         is_featured = ?, published_at = ?, \"order\" = ?, updated_at = CURRENT_TIMESTAMP \
         WHERE id = ? RETURNING *",
    )
    .bind(changes.title.as_deref().unwrap_or(&current.title))
    .bind(&slug)
    .bind(merge_optional(changes.excerpt, current.excerpt))
    .bind(changes.content.unwrap_or(current.content))
    .bind(merge_optional(changes.image, current.image))
    .bind(is_published)
    .bind(changes.is_featured.unwrap_or(current.is_featured))
    .bind(published_at)
    .bind(changes.order.unwrap_or(current.order))
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(map_write_error)?;
    Ok(news)
}

/// Any article by id, regardless of visibility.
pub async fn find(pool: &Pool, id: i64) -> Result<News> {
    super::find_by_id::<News, News>(pool, id).await
}

/// Article by slug. Public reads count as a view.
#[instrument(skip(pool))]
pub async fn find_by_slug(pool: &Pool, slug: &str, audience: Audience) -> Result<News> {
    let mut news: News = visible(audience)
        .where_eq("slug", slug)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SiteError::not_found(News::NAME, slug))?;

    if audience == Audience::Public {
        sqlx::query("UPDATE news SET views = views + 1 WHERE id = ?")
            .bind(news.id)
            .execute(pool)
            .await?;
        news.views += 1;
    }
    Ok(news)
}

/// Newest first by publication time.
#[instrument(skip(pool))]
pub async fn list(
    pool: &Pool,
    audience: Audience,
    filter: NewsFilter,
    page: Pagination,
) -> Result<Paginated<News>> {
    let mut query = visible(audience);
    if let Some(featured) = filter.featured {
        query = query.where_eq("is_featured", featured);
    }
    paginate(pool, query.latest("published_at"), page).await
}

pub async fn featured(pool: &Pool, limit: i64) -> Result<Vec<News>> {
    visible(Audience::Public)
        .where_eq("is_featured", true)
        .ordered(Direction::Asc)
        .latest("published_at")
        .limit(limit)
        .fetch_all(pool)
        .await
}

pub async fn latest(pool: &Pool, limit: i64) -> Result<Vec<News>> {
    visible(Audience::Public)
        .latest("published_at")
        .limit(limit)
        .fetch_all(pool)
        .await
}

pub async fn delete(pool: &Pool, id: i64) -> Result<()> {
    super::delete::<News>(pool, id).await
}
