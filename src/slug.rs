//! URL slugs for content records.
//!
//! Titles are mostly Arabic, so normalization transliterates to ASCII before
//! collapsing separators. Uniqueness is checked against the owning table one
//! candidate at a time (`base`, `base-1`, `base-2`, ...).

use crate::db::Pool;
use crate::error::{Result, SiteError};
use crate::scopes::Entity;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10_000;

static SLUG_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("static regex"));

/// Entity whose rows carry a unique slug derived from a title.
pub trait Sluggable: Entity {
    const SLUG_FIELD: &'static str = "slug";
    /// Used when a title normalizes to nothing (e.g. only punctuation).
    const SLUG_FALLBACK: &'static str;
}

/// Lowercase ASCII, hyphen separated, no leading/trailing/double hyphens.
pub fn slugify(source: &str) -> String {
    ::slug::slugify(source)
}

/// Whether `candidate` is already in slug form.
pub fn is_valid_slug(candidate: &str) -> bool {
    SLUG_SHAPE.is_match(candidate)
}

/// Existence check for slugs in a table.
#[async_trait]
pub trait SlugIndex: Send + Sync {
    async fn slug_exists(&self, table: &str, column: &str, candidate: &str) -> Result<bool>;
}

#[async_trait]
impl SlugIndex for Pool {
    async fn slug_exists(&self, table: &str, column: &str, candidate: &str) -> Result<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE \"{column}\" = ?)");
        let found: i64 = sqlx::query_scalar(&sql)
            .bind(candidate)
            .fetch_one(self)
            .await?;
        Ok(found != 0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SlugGenerator {
    max_attempts: u32,
}

impl Default for SlugGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl SlugGenerator {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Slug for `source` that is unused in `E`'s table right now.
    ///
    /// Nothing is reserved: two concurrent callers can receive the same value,
    /// and the table's UNIQUE index rejects the second insert.
    #[instrument(skip(self, index), fields(table = E::TABLE))]
    pub async fn unique_slug<E: Sluggable>(
        &self,
        index: &dyn SlugIndex,
        source: &str,
    ) -> Result<String> {
        let mut base = slugify(source);
        if base.is_empty() {
            base = E::SLUG_FALLBACK.to_string();
        }

        if !index.slug_exists(E::TABLE, E::SLUG_FIELD, &base).await? {
            return Ok(base);
        }

        for n in 1..=self.max_attempts {
            let candidate = format!("{base}-{n}");
            if !index.slug_exists(E::TABLE, E::SLUG_FIELD, &candidate).await? {
                debug!(%candidate, "slug collision resolved");
                return Ok(candidate);
            }
        }

        Err(SiteError::SlugGenerationExhausted {
            base,
            attempts: self.max_attempts,
        })
    }

    /// Normalize a caller-supplied slug and make sure nobody else owns it.
    pub async fn claim_explicit<E: Sluggable>(
        &self,
        index: &dyn SlugIndex,
        requested: &str,
    ) -> Result<String> {
        let slug = slugify(requested);
        if slug.is_empty() {
            return Err(SiteError::invalid("slug", "الرابط المختصر غير صالح"));
        }
        if index.slug_exists(E::TABLE, E::SLUG_FIELD, &slug).await? {
            return Err(SiteError::invalid("slug", "الرابط المختصر مستخدم مسبقاً"));
        }
        Ok(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashSet;

    /// Index over slugs registered by hand, no database involved.
    #[derive(Debug, Default)]
    struct MemorySlugIndex {
        taken: DashSet<(String, String)>,
    }

    impl MemorySlugIndex {
        fn insert(&self, table: &str, slug: &str) {
            self.taken.insert((table.to_string(), slug.to_string()));
        }
    }

    #[async_trait]
    impl SlugIndex for MemorySlugIndex {
        async fn slug_exists(&self, table: &str, _column: &str, candidate: &str) -> Result<bool> {
            Ok(self
                .taken
                .contains(&(table.to_string(), candidate.to_string())))
        }
    }

    struct Article;
    impl Entity for Article {
        const TABLE: &'static str = "news";
        const NAME: &'static str = "article";
    }
    impl Sluggable for Article {
        const SLUG_FALLBACK: &'static str = "article";
    }

    #[test]
    fn slugify_shapes() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  --Rust & SQL!!  "), "rust-sql");
        assert_eq!(slugify("Crème Brûlée 2024"), "creme-brulee-2024");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn arabic_titles_transliterate_to_ascii() {
        let s = slugify("أخبار الشركة الجديدة");
        assert!(!s.is_empty());
        assert!(is_valid_slug(&s), "not a slug: {s}");
    }

    #[test]
    fn slugify_output_is_always_slug_shaped() {
        let titles = [
            "Hello   World",
            "-leading and trailing-",
            "a--b__c",
            "خدمات الاستشارات 2025",
            "Ünïcödé — dashes – here",
            "MiXeD CaSe",
            "x",
        ];
        for t in titles {
            let s = slugify(t);
            assert!(is_valid_slug(&s), "{t:?} -> {s:?}");
        }
    }

    #[tokio::test]
    async fn collisions_get_numeric_suffixes() {
        let index = MemorySlugIndex::default();
        let gen = SlugGenerator::default();

        let first = gen.unique_slug::<Article>(&index, "Annual Report").await.unwrap();
        assert_eq!(first, "annual-report");
        index.insert("news", &first);

        let second = gen.unique_slug::<Article>(&index, "Annual report!").await.unwrap();
        assert_eq!(second, "annual-report-1");
        index.insert("news", &second);

        let third = gen.unique_slug::<Article>(&index, "annual REPORT").await.unwrap();
        assert_eq!(third, "annual-report-2");
    }

    #[tokio::test]
    async fn other_tables_do_not_collide() {
        let index = MemorySlugIndex::default();
        index.insert("pages", "about");
        let s = SlugGenerator::default()
            .unique_slug::<Article>(&index, "About")
            .await
            .unwrap();
        assert_eq!(s, "about");
    }

    #[tokio::test]
    async fn empty_titles_use_fallback() {
        let index = MemorySlugIndex::default();
        let s = SlugGenerator::default()
            .unique_slug::<Article>(&index, "???")
            .await
            .unwrap();
        assert_eq!(s, "article");
    }

    #[tokio::test]
    async fn exhaustion_is_an_error() {
        let index = MemorySlugIndex::default();
        for s in ["news-item", "news-item-1", "news-item-2"] {
            index.insert("news", s);
        }
        let err = SlugGenerator::new(2)
            .unique_slug::<Article>(&index, "News item")
            .await
            .unwrap_err();
        match err {
            SiteError::SlugGenerationExhausted { base, attempts } => {
                assert_eq!(base, "news-item");
                assert_eq!(attempts, 2);
            }
            other => panic!("wrong error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn explicit_slugs_are_normalized_and_checked() {
        let index = MemorySlugIndex::default();
        index.insert("news", "taken");
        let gen = SlugGenerator::default();

        let s = gen.claim_explicit::<Article>(&index, "My Custom Slug").await.unwrap();
        assert_eq!(s, "my-custom-slug");

        assert!(matches!(
            gen.claim_explicit::<Article>(&index, "Taken").await,
            Err(SiteError::ValidationFailed(_))
        ));
        assert!(matches!(
            gen.claim_explicit::<Article>(&index, "%%%").await,
            Err(SiteError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn pool_index_sees_existing_rows() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        sqlx::query("INSERT INTO news (title, slug) VALUES ('x', 'existing')")
            .execute(&pool)
            .await
            .unwrap();
        assert!(pool.slug_exists("news", "slug", "existing").await.unwrap());
        assert!(!pool.slug_exists("news", "slug", "missing").await.unwrap());

        let s = SlugGenerator::default()
            .unique_slug::<Article>(&pool, "Existing")
            .await
            .unwrap();
        assert_eq!(s, "existing-1");
    }
}
