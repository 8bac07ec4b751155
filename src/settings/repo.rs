//! Settings table: typed rows and the storage port the store reads through.
use crate::db::Pool;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SettingGroup {
    General,
    Company,
    Social,
    Seo,
    Contact,
}

impl SettingGroup {
    pub const ALL: [SettingGroup; 5] = [
        SettingGroup::General,
        SettingGroup::Company,
        SettingGroup::Social,
        SettingGroup::Seo,
        SettingGroup::Contact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingGroup::General => "general",
            SettingGroup::Company => "company",
            SettingGroup::Social => "social",
            SettingGroup::Seo => "seo",
            SettingGroup::Contact => "contact",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == s)
    }
}

impl TryFrom<String> for SettingGroup {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(UnknownVariant {
            kind: "setting group",
            value,
        })
    }
}

/// Drives admin form rendering only; values are always stored as text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    Text,
    Textarea,
    Image,
    Boolean,
    Number,
    Email,
    Url,
    Json,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::Text => "text",
            SettingType::Textarea => "textarea",
            SettingType::Image => "image",
            SettingType::Boolean => "boolean",
            SettingType::Number => "number",
            SettingType::Email => "email",
            SettingType::Url => "url",
            SettingType::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "text" => SettingType::Text,
            "textarea" => SettingType::Textarea,
            "image" => SettingType::Image,
            "boolean" => SettingType::Boolean,
            "number" => SettingType::Number,
            "email" => SettingType::Email,
            "url" => SettingType::Url,
            "json" => SettingType::Json,
            _ => return None,
        })
    }
}

impl TryFrom<String> for SettingType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(UnknownVariant {
            kind: "setting type",
            value,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub id: i64,
    pub key: String,
    #[sqlx(try_from = "String")]
    pub group: SettingGroup,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub kind: SettingType,
    pub value: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
}

/// Persistent side of the settings store.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn find_by_key(&self, key: &str) -> Result<Option<Setting>>;
    /// Insert or overwrite the value; new keys land in `general` as `text`.
    async fn upsert(&self, key: &str, value: Option<&str>) -> Result<()>;
    async fn select_all(&self) -> Result<Vec<Setting>>;
    async fn select_by_group(&self, group: SettingGroup) -> Result<Vec<Setting>>;
}

#[derive(Debug, Clone)]
pub struct SqliteSettingsRepository {
    pool: Pool,
}

impl SqliteSettingsRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

const SELECT_SETTING: &str =
    "SELECT id, key, \"group\", type, value, label, description FROM settings";

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    #[instrument(skip(self))]
    async fn find_by_key(&self, key: &str) -> Result<Option<Setting>> {
        let row = sqlx::query_as::<_, Setting>(&format!("{SELECT_SETTING} WHERE key = ?"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    #[instrument(skip(self, value))]
    async fn upsert(&self, key: &str, value: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn select_all(&self) -> Result<Vec<Setting>> {
        let rows = sqlx::query_as::<_, Setting>(&format!("{SELECT_SETTING} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn select_by_group(&self, group: SettingGroup) -> Result<Vec<Setting>> {
        let rows = sqlx::query_as::<_, Setting>(&format!(
            "{SELECT_SETTING} WHERE \"group\" = ? ORDER BY id"
        ))
        .bind(group.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
