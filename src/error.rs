//! Error taxonomy shared by the core modules and the HTTP layer.
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name → human readable messages, as returned in 422 responses.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub type Result<T, E = SiteError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("validation failed")]
    ValidationFailed(FieldErrors),
    #[error("no free slug for '{base}' after {attempts} attempts")]
    SlugGenerationExhausted { base: String, attempts: u32 },
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl SiteError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        SiteError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        SiteError::ValidationFailed(errors)
    }
}

impl From<sqlx::Error> for SiteError {
    fn from(err: sqlx::Error) -> Self {
        SiteError::Unexpected(anyhow::Error::new(err))
    }
}

impl From<validator::ValidationErrors> for SiteError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, list) in errs.field_errors() {
            let messages = list
                .iter()
                .map(|e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("invalid value ({})", e.code),
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        SiteError::ValidationFailed(fields)
    }
}

/// True when the error is a UNIQUE constraint violation raised by SQLite.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
