//! Homepage slider entries.
use super::merge_optional;
use crate::db::Pool;
use crate::error::Result;
use crate::scopes::{Audience, ContentQuery, Direction, Entity, Orderable, StatusFlagged};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Slider {
    pub id: i64,
    pub title: String,
    pub subtitle: Option<String>,
    pub image: Option<String>,
    pub link: Option<String>,
    pub button_text: Option<String>,
    pub is_active: bool,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Slider {
    const TABLE: &'static str = "sliders";
    const NAME: &'static str = "slider";
}

impl StatusFlagged for Slider {
    const STATUS_FIELD: &'static str = "is_active";
}

impl Orderable for Slider {}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSlider {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 500))]
    pub subtitle: Option<String>,
    pub image: Option<String>,
    #[validate(url)]
    pub link: Option<String>,
    #[validate(length(max = 50))]
    pub button_text: Option<String>,
    pub is_active: bool,
    pub order: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SliderChanges {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 500))]
    pub subtitle: Option<String>,
    pub image: Option<String>,
    #[validate(url)]
    pub link: Option<String>,
    #[validate(length(max = 50))]
    pub button_text: Option<String>,
    pub is_active: Option<bool>,
    pub order: Option<i64>,
}

#[instrument(skip_all)]
pub async fn create(pool: &Pool, mut input: NewSlider) -> Result<Slider> {
    input.title = input.title.trim().to_string();
    input.validate()?;
    let slider = sqlx::query_as::<_, Slider>(
        "INSERT INTO sliders (title, subtitle, image, link, button_text, is_active, \"order\") \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(&input.title)
    .bind(&input.subtitle)
    .bind(&input.image)
    .bind(&input.link)
    .bind(&input.button_text)
    .bind(input.is_active)
    .bind(input.order)
    .fetch_one(pool)
    .await?;
    Ok(slider)
}

#[instrument(skip(pool, changes))]
pub async fn update(pool: &Pool, id: i64, mut changes: SliderChanges) -> Result<Slider> {
    changes.title = changes.title.map(|t| t.trim().to_string());
    // a blank link clears it; only real links go through URL validation
    let clear_link = changes.link.as_deref().is_some_and(|l| l.trim().is_empty());
    if clear_link {
        changes.link = None;
    }
    changes.validate()?;
    let current: Slider = super::find_by_id::<Slider, Slider>(pool, id).await?;
    let slider = sqlx::query_as::<_, Slider>(
        "UPDATE sliders SET title = ?, subtitle = ?, image = ?, link = ?, button_text = ?, \
         is_active = ?, \"order\" = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ? RETURNING *",
    )
    .bind(changes.title.as_deref().unwrap_or(&current.title))
    .bind(merge_optional(changes.subtitle, current.subtitle))
    .bind(merge_optional(changes.image, current.image))
    .bind(if clear_link {
        None
    } else {
        merge_optional(changes.link, current.link)
    })
    .bind(merge_optional(changes.button_text, current.button_text))
    .bind(changes.is_active.unwrap_or(current.is_active))
    .bind(changes.order.unwrap_or(current.order))
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(slider)
}

pub async fn list(pool: &Pool, audience: Audience) -> Result<Vec<Slider>> {
    ContentQuery::<Slider>::new()
        .visible_to(audience)
        .ordered(Direction::Asc)
        .fetch_all(pool)
        .await
}

pub async fn delete(pool: &Pool, id: i64) -> Result<()> {
    super::delete::<Slider>(pool, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::error::SiteError;

    fn slide(title: &str, order: i64, active: bool) -> NewSlider {
        NewSlider {
            title: title.into(),
            subtitle: None,
            image: Some("sliders/1.jpg".into()),
            link: Some("https://example.com/offer".into()),
            button_text: Some("اقرأ المزيد".into()),
            is_active: active,
            order,
        }
    }

    #[tokio::test]
    async fn active_slides_in_order() {
        let pool = db::connect_in_memory().await.unwrap();
        create(&pool, slide("second", 2, true)).await.unwrap();
        create(&pool, slide("off", 0, false)).await.unwrap();
        create(&pool, slide("first", 1, true)).await.unwrap();

        let titles: Vec<_> = list(&pool, Audience::Public)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn bad_link_is_rejected() {
        let pool = db::connect_in_memory().await.unwrap();
        let mut s = slide("x", 0, true);
        s.link = Some("not a url".into());
        let err = create(&pool, s).await.unwrap_err();
        assert!(matches!(err, SiteError::ValidationFailed(f) if f.contains_key("link")));
    }

    #[tokio::test]
    async fn update_and_delete() {
        let pool = db::connect_in_memory().await.unwrap();
        let s = create(&pool, slide("x", 0, true)).await.unwrap();
        let s = update(
            &pool,
            s.id,
            SliderChanges {
                subtitle: Some("sub".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(s.subtitle.as_deref(), Some("sub"));
        delete(&pool, s.id).await.unwrap();
        assert!(list(&pool, Audience::Privileged).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_link_clears_instead_of_failing() {
        let pool = db::connect_in_memory().await.unwrap();
        let s = create(&pool, slide("  promo  ", 0, true)).await.unwrap();
        assert_eq!(s.title, "promo");

        let s = update(
            &pool,
            s.id,
            SliderChanges {
                link: Some(" ".into()),
                button_text: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(s.link.is_none());
        assert!(s.button_text.is_none());
        assert_eq!(s.image.as_deref(), Some("sliders/1.jpg"));

        let err = update(
            &pool,
            s.id,
            SliderChanges {
                link: Some("still not a url".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SiteError::ValidationFailed(f) if f.contains_key("link")));
    }
}
