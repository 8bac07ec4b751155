//! Reusable query scopes for content tables.
//!
//! Entities opt into behavior through capability traits whose associated
//! constants name the columns involved, so the same predicate works for
//! `is_published` on news and `is_active` on sliders. `ContentQuery` collects
//! predicates and ordering and renders them into a `sqlx::QueryBuilder`.

use crate::db::Pool;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::marker::PhantomData;
use tracing::instrument;

/// A table-backed record with an integer `id` primary key.
pub trait Entity {
    const TABLE: &'static str;
    /// Human readable name used in `NotFound` errors.
    const NAME: &'static str;
}

/// Entity with a boolean visibility flag.
pub trait StatusFlagged: Entity {
    const STATUS_FIELD: &'static str = "is_published";
}

/// Entity with an explicit integer display order.
pub trait Orderable: Entity {
    const ORDER_FIELD: &'static str = "order";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Who is asking. Public callers only ever see flagged-on rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Public,
    Privileged,
}

/// A value bound into a predicate.
#[derive(Debug, Clone)]
pub enum Bound {
    Int(i64),
    Text(String),
    Bool(bool),
}

impl From<i64> for Bound {
    fn from(v: i64) -> Self {
        Bound::Int(v)
    }
}

impl From<bool> for Bound {
    fn from(v: bool) -> Self {
        Bound::Bool(v)
    }
}

impl From<&str> for Bound {
    fn from(v: &str) -> Self {
        Bound::Text(v.to_string())
    }
}

impl From<String> for Bound {
    fn from(v: String) -> Self {
        Bound::Text(v)
    }
}

#[derive(Debug, Clone)]
enum Filter {
    Eq(&'static str, Bound),
    Raw(&'static str),
}

fn quoted(column: &str) -> String {
    format!("\"{column}\"")
}

/// Composable SELECT over one entity table.
pub struct ContentQuery<E> {
    filters: Vec<Filter>,
    order: Vec<(&'static str, Direction)>,
    limit: Option<i64>,
    offset: Option<i64>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for ContentQuery<E> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Default for ContentQuery<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> ContentQuery<E> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            _entity: PhantomData,
        }
    }

    pub fn where_eq(mut self, column: &'static str, value: impl Into<Bound>) -> Self {
        self.filters.push(Filter::Eq(column, value.into()));
        self
    }

    /// Append a literal SQL predicate. Only ever called with static fragments.
    pub fn where_raw(mut self, predicate: &'static str) -> Self {
        self.filters.push(Filter::Raw(predicate));
        self
    }

    /// Newest first by `column`, then by id.
    pub fn latest(mut self, column: &'static str) -> Self {
        self.order.push((column, Direction::Desc));
        self.order.push(("id", Direction::Desc));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn push_filters(&self, qb: &mut QueryBuilder<'static, Sqlite>) {
        for (i, filter) in self.filters.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            match filter {
                Filter::Eq(column, value) => {
                    qb.push(quoted(column)).push(" = ");
                    match value.clone() {
                        Bound::Int(v) => qb.push_bind(v),
                        Bound::Text(v) => qb.push_bind(v),
                        Bound::Bool(v) => qb.push_bind(v),
                    };
                }
                Filter::Raw(sql) => {
                    qb.push("(").push(*sql).push(")");
                }
            }
        }
    }

    fn render_select(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(format!("SELECT * FROM {}", E::TABLE));
        self.push_filters(&mut qb);

        let mut order: Vec<String> = self
            .order
            .iter()
            .map(|(c, d)| format!("{} {}", quoted(c), d.as_sql()))
            .collect();
        // Ties fall back to insertion order.
        if !self.order.iter().any(|(c, _)| *c == "id") {
            order.push("\"id\" ASC".to_string());
        }
        qb.push(" ORDER BY ").push(order.join(", "));

        if let Some(limit) = self.limit {
            qb.push(" LIMIT ").push_bind(limit);
            if let Some(offset) = self.offset {
                qb.push(" OFFSET ").push_bind(offset);
            }
        }
        qb
    }

    pub fn to_sql(&self) -> String {
        self.render_select().sql().to_string()
    }

    #[instrument(skip_all, fields(table = E::TABLE))]
    pub async fn fetch_all<T>(&self, pool: &Pool) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut qb = self.render_select();
        let rows = qb.build_query_as::<T>().fetch_all(pool).await?;
        Ok(rows)
    }

    #[instrument(skip_all, fields(table = E::TABLE))]
    pub async fn fetch_optional<T>(&self, pool: &Pool) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut qb = self.clone().limit(1).render_select();
        let row = qb.build_query_as::<T>().fetch_optional(pool).await?;
        Ok(row)
    }

    /// Row count honoring filters; ordering and paging are ignored.
    #[instrument(skip_all, fields(table = E::TABLE))]
    pub async fn count(&self, pool: &Pool) -> Result<i64> {
        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", E::TABLE));
        self.push_filters(&mut qb);
        let n = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
        Ok(n)
    }
}

impl<E: StatusFlagged> ContentQuery<E> {
    pub fn published(self) -> Self {
        self.where_eq(E::STATUS_FIELD, true)
    }

    pub fn unpublished(self) -> Self {
        self.where_eq(E::STATUS_FIELD, false)
    }

    pub fn active(self) -> Self {
        self.published()
    }

    pub fn inactive(self) -> Self {
        self.unpublished()
    }

    pub fn visible_to(self, audience: Audience) -> Self {
        match audience {
            Audience::Public => self.published(),
            Audience::Privileged => self,
        }
    }
}

impl<E: Orderable> ContentQuery<E> {
    /// Sort by the entity's order column; equal positions keep insertion order.
    pub fn ordered(mut self, direction: Direction) -> Self {
        self.order.push((E::ORDER_FIELD, direction));
        self
    }
}

/// Flip the status flag of one record. Returns whether a row was written.
#[instrument(skip(pool), fields(table = E::TABLE))]
pub async fn toggle_status<E: StatusFlagged>(pool: &Pool, id: i64) -> Result<bool> {
    let field = quoted(E::STATUS_FIELD);
    let sql = format!(
        "UPDATE {} SET {field} = NOT {field}, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        E::TABLE
    );
    let res = sqlx::query(&sql).bind(id).execute(pool).await?;
    Ok(res.rows_affected() == 1)
}

/// Move one record to `position`. Siblings are not renumbered.
#[instrument(skip(pool), fields(table = E::TABLE))]
pub async fn move_to<E: Orderable>(pool: &Pool, id: i64, position: i64) -> Result<bool> {
    let sql = format!(
        "UPDATE {} SET {} = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        E::TABLE,
        quoted(E::ORDER_FIELD)
    );
    let res = sqlx::query(&sql).bind(position).bind(id).execute(pool).await?;
    Ok(res.rows_affected() == 1)
}
