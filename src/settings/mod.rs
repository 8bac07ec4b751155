//! Site-wide key/value settings with cache-aside reads.
//!
//! - `cache`: the cache port and the in-process `MemoryCache`.
//! - `repo`: typed rows and the storage port backed by SQLite.
//!
//! `SettingsStore` is an ordinary service value: build one per process and
//! clone it where needed. Per-key entries and the aggregate map are cached
//! with no expiry and dropped on every write that could make them stale.
//! Cache reads and fills are best-effort; a write whose invalidation cannot
//! be applied fails instead of leaving a stale entry behind.
//!
//! Every write bumps a shared counter. A reader that loaded from storage
//! before a write landed does not put its (older) value into the cache.

pub mod cache;
pub mod repo;

pub use cache::{MemoryCache, SettingsCache};
pub use repo::{Setting, SettingGroup, SettingType, SettingsRepository, SqliteSettingsRepository};

use crate::db::Pool;
use crate::error::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// key → value; a `None` value is a setting that exists but is empty.
pub type SettingsMap = BTreeMap<String, Option<String>>;

const ALL_SETTINGS_KEY: &str = "settings:all";

fn entry_key(key: &str) -> String {
    format!("setting:{key}")
}

#[derive(Clone)]
pub struct SettingsStore {
    repo: Arc<dyn SettingsRepository>,
    cache: Arc<dyn SettingsCache>,
    writes: Arc<AtomicU64>,
}

impl SettingsStore {
    pub fn new(repo: Arc<dyn SettingsRepository>, cache: Arc<dyn SettingsCache>) -> Self {
        Self {
            repo,
            cache,
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// SQLite storage with a fresh in-process cache.
    pub fn with_pool(pool: Pool) -> Self {
        Self::new(
            Arc::new(SqliteSettingsRepository::new(pool)),
            Arc::new(MemoryCache::new()),
        )
    }

    fn write_epoch(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    async fn cached(&self, entry: &str) -> Option<Value> {
        match self.cache.get(entry).await {
            Ok(v) => v,
            Err(err) => {
                warn!(?err, entry, "settings cache read failed; reading storage");
                None
            }
        }
    }

    /// Cache `value`, read from storage at `epoch`, unless a write has landed since.
    async fn fill(&self, entry: &str, value: Value, epoch: u64) {
        if self.write_epoch() != epoch {
            debug!(entry, "write landed during read; not caching");
            return;
        }
        if let Err(err) = self.cache.put(entry, value).await {
            warn!(?err, entry, "settings cache write failed");
            return;
        }
        // a write may have invalidated between the check and the put
        if self.write_epoch() != epoch {
            if let Err(err) = self.cache.forget(entry).await {
                warn!(?err, entry, "could not drop racing cache fill");
            }
        }
    }

    /// Overwrite an entry the cache refused to drop.
    async fn overwrite(&self, entry: &str, fresh: Value) -> Result<()> {
        self.cache
            .put(entry, fresh)
            .await
            .map_err(|e| e.context(format!("stale settings cache entry {entry}")))?;
        Ok(())
    }

    async fn load_all(&self) -> Result<SettingsMap> {
        Ok(self
            .repo
            .select_all()
            .await?
            .into_iter()
            .map(|s| (s.key, s.value))
            .collect())
    }

    /// Value stored under `key`, or `default` when no such setting exists.
    ///
    /// A setting that exists with an empty value yields `None`, not `default`.
    #[instrument(skip(self, default))]
    pub async fn get(&self, key: &str, default: Option<&str>) -> Result<Option<String>> {
        let entry = entry_key(key);
        if let Some(hit) = self.cached(&entry).await {
            match serde_json::from_value::<Option<String>>(hit) {
                Ok(value) => return Ok(value),
                Err(err) => warn!(?err, key, "discarding malformed cached setting"),
            }
        }

        let epoch = self.write_epoch();
        let Some(record) = self.repo.find_by_key(key).await? else {
            return Ok(default.map(str::to_owned));
        };
        self.fill(&entry, Value::from(record.value.clone()), epoch).await;
        Ok(record.value)
    }

    /// Like `get`, but empty values also fall back to `default`.
    pub async fn get_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get(key, Some(default))
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Upsert `key` and drop its cache entry plus the aggregate map.
    ///
    /// Fails when the cache can neither drop nor overwrite those entries; the
    /// stored value is already updated at that point.
    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: Option<&str>) -> Result<()> {
        self.repo.upsert(key, value).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);

        let entry = entry_key(key);
        if let Err(err) = self.cache.forget(&entry).await {
            warn!(?err, %entry, "settings cache invalidation failed; overwriting entry");
            self.overwrite(&entry, Value::from(value)).await?;
        }
        if let Err(err) = self.cache.forget(ALL_SETTINGS_KEY).await {
            warn!(?err, "settings map invalidation failed; overwriting entry");
            let map = serde_json::to_value(self.load_all().await?).map_err(anyhow::Error::from)?;
            self.overwrite(ALL_SETTINGS_KEY, map).await?;
        }
        Ok(())
    }

    /// Every setting as one map, cached as a whole.
    #[instrument(skip_all)]
    pub async fn all(&self) -> Result<SettingsMap> {
        if let Some(hit) = self.cached(ALL_SETTINGS_KEY).await {
            match serde_json::from_value::<SettingsMap>(hit) {
                Ok(map) => return Ok(map),
                Err(err) => warn!(?err, "discarding malformed cached settings map"),
            }
        }

        let epoch = self.write_epoch();
        let map = self.load_all().await?;
        match serde_json::to_value(&map) {
            Ok(v) => self.fill(ALL_SETTINGS_KEY, v, epoch).await,
            Err(err) => warn!(?err, "settings map not cacheable"),
        }
        Ok(map)
    }

    /// Uncached; admin screens read through this.
    #[instrument(skip(self))]
    pub async fn by_group(&self, group: SettingGroup) -> Result<SettingsMap> {
        Ok(self
            .repo
            .select_by_group(group)
            .await?
            .into_iter()
            .map(|s| (s.key, s.value))
            .collect())
    }

    /// Full rows of one group, uncached.
    pub async fn records_by_group(&self, group: SettingGroup) -> Result<Vec<Setting>> {
        Ok(self.repo.select_by_group(group).await?)
    }

    /// Drop every per-key entry and the aggregate map.
    ///
    /// Tries every entry; reports the first one the cache refused to drop.
    #[instrument(skip_all)]
    pub async fn clear_cache(&self) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let entries = self
            .repo
            .select_all()
            .await?
            .into_iter()
            .map(|s| entry_key(&s.key))
            .chain(std::iter::once(ALL_SETTINGS_KEY.to_string()));

        let mut failure = None;
        for entry in entries {
            if let Err(err) = self.cache.forget(&entry).await {
                warn!(?err, %entry, "settings cache invalidation failed");
                failure.get_or_insert(err.context(format!("stale settings cache entry {entry}")));
            }
        }
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;

    async fn store_with_cache() -> (SettingsStore, Arc<MemoryCache>, Pool) {
        let pool = db::connect_in_memory().await.unwrap();
        let cache = Arc::new(MemoryCache::new());
        let store = SettingsStore::new(
            Arc::new(SqliteSettingsRepository::new(pool.clone())),
            cache.clone(),
        );
        (store, cache, pool)
    }

    struct BrokenCache;

    #[async_trait]
    impl SettingsCache for BrokenCache {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<Value>> {
            Err(anyhow::anyhow!("cache down"))
        }
        async fn put(&self, _key: &str, _value: Value) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("cache down"))
        }
        async fn forget(&self, _key: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("cache down"))
        }
    }

    /// Reads and writes work; invalidation always fails.
    #[derive(Default)]
    struct StickyCache {
        inner: MemoryCache,
    }

    #[async_trait]
    impl SettingsCache for StickyCache {
        async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
            self.inner.get(key).await
        }
        async fn put(&self, key: &str, value: Value) -> anyhow::Result<()> {
            self.inner.put(key, value).await
        }
        async fn forget(&self, _key: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("forget unsupported"))
        }
    }

    /// Storage that parks the next lookup (or listing) after reading, until resumed.
    struct GatedRepo {
        inner: SqliteSettingsRepository,
        hold_lookup: AtomicBool,
        hold_listing: AtomicBool,
        parked: Notify,
        resume: Notify,
    }

    impl GatedRepo {
        fn new(pool: Pool) -> Self {
            Self {
                inner: SqliteSettingsRepository::new(pool),
                hold_lookup: AtomicBool::new(false),
                hold_listing: AtomicBool::new(false),
                parked: Notify::new(),
                resume: Notify::new(),
            }
        }

        async fn hold(&self, flag: &AtomicBool) {
            if flag.swap(false, Ordering::SeqCst) {
                self.parked.notify_one();
                self.resume.notified().await;
            }
        }
    }

    #[async_trait]
    impl SettingsRepository for GatedRepo {
        async fn find_by_key(&self, key: &str) -> anyhow::Result<Option<Setting>> {
            let found = self.inner.find_by_key(key).await;
            self.hold(&self.hold_lookup).await;
            found
        }
        async fn upsert(&self, key: &str, value: Option<&str>) -> anyhow::Result<()> {
            self.inner.upsert(key, value).await
        }
        async fn select_all(&self) -> anyhow::Result<Vec<Setting>> {
            let rows = self.inner.select_all().await;
            self.hold(&self.hold_listing).await;
            rows
        }
        async fn select_by_group(&self, group: SettingGroup) -> anyhow::Result<Vec<Setting>> {
            self.inner.select_by_group(group).await
        }
    }

    async fn gated_store() -> (SettingsStore, Arc<GatedRepo>) {
        let pool = db::connect_in_memory().await.unwrap();
        let repo = Arc::new(GatedRepo::new(pool));
        let store = SettingsStore::new(repo.clone(), Arc::new(MemoryCache::new()));
        (store, repo)
    }

    #[tokio::test]
    async fn missing_key_returns_default_and_is_not_cached() {
        let (store, cache, _pool) = store_with_cache().await;
        let v = store.get("nope", Some("fallback")).await.unwrap();
        assert_eq!(v.as_deref(), Some("fallback"));
        assert!(store.get("nope", None).await.unwrap().is_none());
        assert!(!cache.contains("setting:nope"));
    }

    #[tokio::test]
    async fn set_then_get_returns_new_value() {
        let (store, cache, _pool) = store_with_cache().await;

        // warm the cache with the seeded value first
        let before = store.get("site_name", Some("x")).await.unwrap();
        assert_eq!(before.as_deref(), Some("الشركة"));
        assert!(cache.contains("setting:site_name"));

        store.set("site_name", Some("Acme")).await.unwrap();
        assert!(!cache.contains("setting:site_name"));
        assert_eq!(
            store.get("site_name", Some("x")).await.unwrap().as_deref(),
            Some("Acme")
        );
    }

    #[tokio::test]
    async fn set_creates_missing_keys() {
        let (store, _cache, _pool) = store_with_cache().await;
        store.set("footer_note", Some("hi")).await.unwrap();
        assert_eq!(store.get_or("footer_note", "-").await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn empty_value_is_not_the_default() {
        let (store, _cache, _pool) = store_with_cache().await;
        // seeded with NULL
        assert!(store.get("meta_title", Some("d")).await.unwrap().is_none());
        assert_eq!(store.get_or("meta_title", "d").await.unwrap(), "d");
    }

    #[tokio::test]
    async fn set_only_invalidates_its_own_key() {
        let (store, cache, _pool) = store_with_cache().await;
        store.get("site_name", None).await.unwrap();
        store.get("contact_email", None).await.unwrap();
        store.set("site_name", Some("Acme")).await.unwrap();
        assert!(!cache.contains("setting:site_name"));
        assert!(cache.contains("setting:contact_email"));
    }

    #[tokio::test]
    async fn aggregate_map_reflects_writes() {
        let (store, cache, _pool) = store_with_cache().await;
        let all = store.all().await.unwrap();
        assert!(all.contains_key("site_name"));
        assert!(cache.contains(ALL_SETTINGS_KEY));

        store.set("site_name", Some("Acme")).await.unwrap();
        assert!(!cache.contains(ALL_SETTINGS_KEY));
        let all = store.all().await.unwrap();
        assert_eq!(all["site_name"].as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn by_group_is_uncached_and_filtered() {
        let (store, cache, pool) = store_with_cache().await;
        let contact = store.by_group(SettingGroup::Contact).await.unwrap();
        assert!(contact.contains_key("contact_email"));
        assert!(!contact.contains_key("site_name"));
        assert!(cache.is_empty());

        sqlx::query("UPDATE settings SET value = 'a@b.c' WHERE key = 'contact_email'")
            .execute(&pool)
            .await
            .unwrap();
        let contact = store.by_group(SettingGroup::Contact).await.unwrap();
        assert_eq!(contact["contact_email"].as_deref(), Some("a@b.c"));

        let rows = store.records_by_group(SettingGroup::Contact).await.unwrap();
        assert_eq!(rows.len(), contact.len());
    }

    #[tokio::test]
    async fn clear_cache_exposes_out_of_band_writes() {
        let (store, cache, pool) = store_with_cache().await;
        store.get("site_name", None).await.unwrap();
        store.all().await.unwrap();

        sqlx::query("UPDATE settings SET value = 'Direct' WHERE key = 'site_name'")
            .execute(&pool)
            .await
            .unwrap();
        // still served from cache
        assert_eq!(
            store.get("site_name", None).await.unwrap().as_deref(),
            Some("الشركة")
        );

        store.clear_cache().await.unwrap();
        assert!(cache.is_empty());
        assert_eq!(
            store.get("site_name", None).await.unwrap().as_deref(),
            Some("Direct")
        );
        assert_eq!(store.all().await.unwrap()["site_name"].as_deref(), Some("Direct"));
    }

    #[tokio::test]
    async fn broken_cache_degrades_to_storage() {
        let pool = db::connect_in_memory().await.unwrap();
        let store = SettingsStore::new(
            Arc::new(SqliteSettingsRepository::new(pool)),
            Arc::new(BrokenCache),
        );
        // stored, but the write reports that the cache could not be brought in line
        assert!(store.set("site_name", Some("Acme")).await.is_err());
        assert_eq!(
            store.get("site_name", None).await.unwrap().as_deref(),
            Some("Acme")
        );
        assert_eq!(store.all().await.unwrap()["site_name"].as_deref(), Some("Acme"));
        assert!(matches!(
            store.clear_cache().await,
            Err(crate::SiteError::Unexpected(_))
        ));
    }

    #[tokio::test]
    async fn failed_invalidation_overwrites_stale_entries() {
        let pool = db::connect_in_memory().await.unwrap();
        let store = SettingsStore::new(
            Arc::new(SqliteSettingsRepository::new(pool)),
            Arc::new(StickyCache::default()),
        );
        assert_eq!(
            store.get("site_name", None).await.unwrap().as_deref(),
            Some("الشركة")
        );
        store.all().await.unwrap();

        store.set("site_name", Some("Acme")).await.unwrap();
        assert_eq!(
            store.get("site_name", None).await.unwrap().as_deref(),
            Some("Acme")
        );
        assert_eq!(store.all().await.unwrap()["site_name"].as_deref(), Some("Acme"));

        store.set("site_name", None).await.unwrap();
        assert!(store.get("site_name", Some("d")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_overtaken_by_set_does_not_cache_old_value() {
        let (store, repo) = gated_store().await;
        repo.hold_lookup.store(true, Ordering::SeqCst);

        let reader = store.clone();
        let pending = tokio::spawn(async move { reader.get("site_name", None).await });
        repo.parked.notified().await;

        store.set("site_name", Some("Acme")).await.unwrap();
        repo.resume.notify_one();

        // the overtaken read may still answer with what it loaded
        assert_eq!(pending.await.unwrap().unwrap().as_deref(), Some("الشركة"));
        assert_eq!(
            store.get("site_name", None).await.unwrap().as_deref(),
            Some("Acme")
        );
    }

    #[tokio::test]
    async fn listing_overtaken_by_set_does_not_cache_old_map() {
        let (store, repo) = gated_store().await;
        repo.hold_listing.store(true, Ordering::SeqCst);

        let reader = store.clone();
        let pending = tokio::spawn(async move { reader.all().await });
        repo.parked.notified().await;

        store.set("site_name", Some("Acme")).await.unwrap();
        repo.resume.notify_one();

        assert_eq!(
            pending.await.unwrap().unwrap()["site_name"].as_deref(),
            Some("الشركة")
        );
        assert_eq!(store.all().await.unwrap()["site_name"].as_deref(), Some("Acme"));
    }
}
