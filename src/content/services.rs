//! Services offered by the company.
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
pub struct Service {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Service {
    const TABLE: &'static str = "services";
    const NAME: &'static str = "service";
}

impl StatusFlagged for Service {
    const STATUS_FIELD: &'static str = "is_active";
}

impl Orderable for Service {}

impl Sluggable for Service {
    const SLUG_FALLBACK: &'static str = "service";
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewService {
    #[validate(length(min = 2, max = 255))]
    pub title: String,
    pub slug: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub content: Option<String>,
    #[validate(length(max = 100))]
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub order: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ServiceChanges {
    #[validate(length(min = 2, max = 255))]
    pub title: Option<String>,
    pub slug: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub content: Option<String>,
    #[validate(length(max = 100))]
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
    pub order: Option<i64>,
}

#[instrument(skip_all)]
pub async fn create(
    pool: &Pool,
    slugs: &SlugGenerator,
    mut input: NewService,
) -> Result<Service> {
    input.title = input.title.trim().to_string();
    input.validate()?;
    let title = input.title.as_str();
    let slug = slug_for_new::<Service>(pool, slugs, input.slug.as_deref(), title).await?;
    let service = sqlx::query_as::<_, Service>(
        "INSERT INTO services (title, slug, description, content, icon, image, is_active, \"order\") \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(title)
    .bind(&slug)
    .bind(&input.description)
    .bind(&input.content)
    .bind(&input.icon)
    .bind(&input.image)
    .bind(input.is_active)
    .bind(input.order)
    .fetch_one(pool)
    .await
    .map_err(map_write_error)?;
    Ok(service)
}

#[instrument(skip(pool, slugs, changes))]
pub async fn update(
    pool: &Pool,
    slugs: &SlugGenerator,
    id: i64,
    mut changes: ServiceChanges,
) -> Result<Service> {
    changes.title = changes.title.map(|t| t.trim().to_string());
    changes.validate()?;
    let current: Service = super::find_by_id::<Service, Service>(pool, id).await?;
    let slug =
        slug_for_update::<Service>(pool, slugs, changes.slug.as_deref(), &current.slug).await?;
    let service = sqlx::query_as::<_, Service>(
        "UPDATE services SET title = ?, slug = ?, description = ?, content = ?, icon = ?, image = ?, \
         is_active = ?, \"order\" = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ? RETURNING *",
    )
    .bind(changes.title.as_deref().unwrap_or(&current.title))
    .bind(&slug)
    .bind(merge_optional(changes.description, current.description))
    .bind(merge_optional(changes.content, current.content))
    .bind(merge_optional(changes.icon, current.icon))
    .bind(merge_optional(changes.image, current.image))
    .bind(changes.is_active.unwrap_or(current.is_active))
    .bind(changes.order.unwrap_or(current.order))
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(map_write_error)?;
    Ok(service)
}

pub async fn find_by_slug(pool: &Pool, slug: &str, audience: Audience) -> Result<Service> {
    ContentQuery::<Service>::new()
        .visible_to(audience)
        .where_eq("slug", slug)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SiteError::not_found(Service::NAME, slug))
}

pub async fn list(pool: &Pool, audience: Audience) -> Result<Vec<Service>> {
    ContentQuery::<Service>::new()
        .visible_to(audience)
        .ordered(Direction::Asc)
        .fetch_all(pool)
        .await
}

pub async fn delete(pool: &Pool, id: i64) -> Result<()> {
    super::delete::<Service>(pool, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::scopes::{move_to, toggle_status};

    fn service(title: &str, order: i64) -> NewService {
        NewService {
            title: title.into(),
            slug: None,
            description: None,
            content: None,
            icon: Some("fa-cog".into()),
            image: None,
            is_active: true,
            order,
        }
    }

    #[tokio::test]
    async fn inactive_services_are_hidden_from_public() {
        let pool = db::connect_in_memory().await.unwrap();
        let slugs = SlugGenerator::default();
        let a = create(&pool, &slugs, service("Consulting", 2)).await.unwrap();
        let b = create(&pool, &slugs, service("Design", 1)).await.unwrap();

        let titles: Vec<_> = list(&pool, Audience::Public)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Design", "Consulting"]);

        toggle_status::<Service>(&pool, b.id).await.unwrap();
        let public = list(&pool, Audience::Public).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, a.id);
        assert!(find_by_slug(&pool, "design", Audience::Public).await.is_err());
        assert!(find_by_slug(&pool, "design", Audience::Privileged).await.is_ok());
    }

    #[tokio::test]
    async fn move_to_reorders_without_renumbering() {
        let pool = db::connect_in_memory().await.unwrap();
        let slugs = SlugGenerator::default();
        let a = create(&pool, &slugs, service("Alpha", 1)).await.unwrap();
        let b = create(&pool, &slugs, service("Beta", 2)).await.unwrap();
        move_to::<Service>(&pool, a.id, 3).await.unwrap();
        let rows = list(&pool, Audience::Privileged).await.unwrap();
        assert_eq!(rows[0].id, b.id);
        assert_eq!(rows[0].order, 2);
        assert_eq!(rows[1].order, 3);
    }

    #[tokio::test]
    async fn update_can_deactivate() {
        let pool = db::connect_in_memory().await.unwrap();
        let slugs = SlugGenerator::default();
        let s = create(&pool, &slugs, service("Support", 0)).await.unwrap();
        let s = update(
            &pool,
            &slugs,
            s.id,
            ServiceChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(!s.is_active);
        assert_eq!(s.icon.as_deref(), Some("fa-cog"));
    }
}
