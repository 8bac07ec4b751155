//! Contact-form intake and the inbox queries behind the admin screen.
use crate::content::{paginate, Paginated, Pagination};
use crate::db::Pool;
use crate::error::{Result, SiteError};
use crate::scopes::{ContentQuery, Entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::{info, instrument};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for Contact {
    const TABLE: &'static str = "contacts";
    const NAME: &'static str = "contact";
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ContactForm {
    #[validate(length(min = 2, max = 100, message = "الاسم يجب أن يكون بين 2 و 100 حرف"))]
    pub name: String,
    #[validate(email(message = "البريد الإلكتروني غير صالح"))]
    pub email: String,
    #[validate(length(max = 20, message = "رقم الهاتف طويل جداً"))]
    pub phone: Option<String>,
    #[validate(length(max = 200, message = "الموضوع طويل جداً"))]
    pub subject: Option<String>,
    #[validate(length(min = 10, max = 5000, message = "الرسالة يجب أن تكون بين 10 و 5000 حرف"))]
    pub message: String,
}

impl ContactForm {
    fn trimmed(self) -> Self {
        fn opt(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: opt(self.phone),
            subject: opt(self.subject),
            message: self.message.trim().to_string(),
        }
    }
}

/// Validate and store one submission.
#[instrument(skip_all)]
pub async fn submit(pool: &Pool, form: ContactForm) -> Result<Contact> {
    let form = form.trimmed();
    form.validate()?;
    let contact = sqlx::query_as::<_, Contact>(
        "INSERT INTO contacts (name, email, phone, subject, message) VALUES (?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(&form.name)
    .bind(&form.email)
    .bind(&form.phone)
    .bind(&form.subject)
    .bind(&form.message)
    .fetch_one(pool)
    .await?;
    info!(id = contact.id, "contact message received");
    Ok(contact)
}

/// Newest first; optionally only unread messages.
pub async fn list(pool: &Pool, unread_only: bool, page: Pagination) -> Result<Paginated<Contact>> {
    let mut query = ContentQuery::<Contact>::new();
    if unread_only {
        query = query.where_eq("is_read", false);
    }
    paginate(pool, query.latest("created_at"), page).await
}

#[instrument(skip(pool))]
pub async fn mark_read(pool: &Pool, id: i64) -> Result<()> {
    let res = sqlx::query("UPDATE contacts SET is_read = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(SiteError::not_found(Contact::NAME, id));
    }
    Ok(())
}

pub async fn unread_count(pool: &Pool) -> Result<i64> {
    ContentQuery::<Contact>::new()
        .where_eq("is_read", false)
        .count(pool)
        .await
}

pub async fn delete(pool: &Pool, id: i64) -> Result<()> {
    crate::content::delete::<Contact>(pool, id).await
}
