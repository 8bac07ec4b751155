//! Content models and their queries.
//!
//! Every content type composes the scopes from `crate::scopes`; the helpers
//! here cover the lookups they all share (by id, by slug, delete, paging).

pub mod news;
pub mod pages;
pub mod services;
pub mod sliders;

pub use news::{News, NewsChanges, NewsFilter, NewNews};
pub use pages::{NewPage, Page, PageChanges};
pub use services::{NewService, Service, ServiceChanges};
pub use sliders::{NewSlider, Slider, SliderChanges};

use crate::db::Pool;
use crate::error::{self, Result, SiteError};
use crate::scopes::{ContentQuery, Entity};
use crate::slug::{SlugGenerator, Sluggable};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;
use tracing::instrument;

/// 1-based page request, already clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, per_page: Option<u32>, default_per_page: u32, max: u32) -> Self {
        let per_page = per_page.unwrap_or(default_per_page).clamp(1, max.max(1));
        Self {
            page: page.unwrap_or(1).max(1),
            per_page,
        }
    }

    fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

/// Run `query` for one page and count the full result set.
pub async fn paginate<E, T>(pool: &Pool, query: ContentQuery<E>, page: Pagination) -> Result<Paginated<T>>
where
    E: Entity,
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let total = query.count(pool).await?;
    let items = query
        .limit(i64::from(page.per_page))
        .offset(page.offset())
        .fetch_all(pool)
        .await?;
    let per_page = i64::from(page.per_page);
    let last_page = ((total + per_page - 1) / per_page).max(1);
    Ok(Paginated {
        items,
        total,
        page: page.page,
        per_page: page.per_page,
        last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
    })
}

pub async fn find_by_id<E, T>(pool: &Pool, id: i64) -> Result<T>
where
    E: Entity,
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    ContentQuery::<E>::new()
        .where_eq("id", id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SiteError::not_found(E::NAME, id))
}

#[instrument(skip(pool), fields(table = E::TABLE))]
pub async fn delete<E: Entity>(pool: &Pool, id: i64) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?", E::TABLE);
    let res = sqlx::query(&sql).bind(id).execute(pool).await?;
    if res.rows_affected() == 0 {
        return Err(SiteError::not_found(E::NAME, id));
    }
    Ok(())
}

/// Slug for a new record: the caller's own (normalized, must be free) or one
/// derived from `title`.
pub(crate) async fn slug_for_new<E: Sluggable>(
    pool: &Pool,
    slugs: &SlugGenerator,
    requested: Option<&str>,
    title: &str,
) -> Result<String> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(explicit) => slugs.claim_explicit::<E>(pool, explicit).await,
        None => slugs.unique_slug::<E>(pool, title).await,
    }
}

/// Slug after an edit. Titles never move a slug; only an explicit new slug does.
pub(crate) async fn slug_for_update<E: Sluggable>(
    pool: &Pool,
    slugs: &SlugGenerator,
    requested: Option<&str>,
    current: &str,
) -> Result<String> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(explicit) if crate::slug::slugify(explicit) != current => {
            slugs.claim_explicit::<E>(pool, explicit).await
        }
        _ => Ok(current.to_string()),
    }
}

/// Edit of a nullable text column: `None` keeps `current`, a blank string clears it.
pub(crate) fn merge_optional(change: Option<String>, current: Option<String>) -> Option<String> {
    match change {
        Some(v) if v.trim().is_empty() => None,
        Some(v) => Some(v),
        None => current,
    }
}

/// Lost the read-then-write race on a UNIQUE slug column.
pub(crate) fn map_write_error(err: sqlx::Error) -> SiteError {
    if error::is_unique_violation(&err) {
        SiteError::invalid("slug", "الرابط المختصر مستخدم مسبقاً")
    } else {
        err.into()
    }
}
