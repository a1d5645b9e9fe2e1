//! # Catalog Resolver
//!
//! Maps a scanned token to a sellable item using two tiers.
//!
//! ## Resolution Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  resolve(token)                                                        │
//! │     │                                                                   │
//! │     ├── snapshot()  lazy load, refresh after TTL, keep stale on error  │
//! │     │                                                                   │
//! │     ├── Tier 1: resolve_barcode(token) bounded by remote_timeout       │
//! │     │      ├── Some(hit) ──► snapshot.resolve_remote(hit) ──► done     │
//! │     │      ├── Some(invalid hit) ┐ warn!, soft                         │
//! │     │      ├── None ─────────────┐                                     │
//! │     │      ├── Err(transport) ───┤ warn!, soft                         │
//! │     │      └── timeout ──────────┤ warn!, soft                         │
//! │     │                            ▼                                     │
//! │     └── Tier 2: snapshot.resolve_local(token)                          │
//! │                                                                         │
//! │  In-flight remote calls are never cancelled by newer scans.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mart_core::validation::validate_barcode_hit;
use mart_core::{CatalogSnapshot, ResolveFailure, Resolved};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog::CatalogService;
use crate::config::ResolverSettings;
use crate::error::CatalogError;

struct CachedSnapshot {
    snapshot: Arc<CatalogSnapshot>,
    loaded_at: Instant,
}

/// Two-tier catalog resolver with a cached local snapshot.
pub struct CatalogResolver {
    service: Arc<dyn CatalogService>,
    remote_enabled: bool,
    remote_timeout: Duration,
    snapshot_ttl: Duration,
    cache: Mutex<Option<CachedSnapshot>>,
}

impl CatalogResolver {
    pub fn new(service: Arc<dyn CatalogService>, settings: &ResolverSettings) -> Self {
        CatalogResolver {
            service,
            remote_enabled: settings.remote_enabled,
            remote_timeout: settings.remote_timeout(),
            snapshot_ttl: settings.snapshot_ttl(),
            cache: Mutex::new(None),
        }
    }

    /// Resolves a token to a purchasable item.
    pub async fn resolve(&self, token: &str) -> Result<Resolved, ResolveFailure> {
        let snapshot = self.snapshot().await;

        if self.remote_enabled {
            match self.remote_lookup(token).await {
                Ok(Some(hit)) => match validate_barcode_hit(&hit) {
                    Ok(()) => {
                        debug!(token = %token, sku = %hit.sku, "Remote registry hit");
                        return snapshot.resolve_remote(&hit);
                    }
                    Err(e) => {
                        warn!(token = %token, sku = %hit.sku, error = %e, "Discarding invalid registry hit, trying snapshot");
                    }
                },
                Ok(None) => {
                    debug!(token = %token, "Remote registry miss, trying snapshot");
                }
                Err(e) => {
                    warn!(token = %token, error = %e, "Remote lookup failed, falling back to snapshot");
                }
            }
        }

        snapshot.resolve_local(token)
    }

    /// Returns the local snapshot, loading or refreshing it when needed.
    ///
    /// A failed refresh keeps serving the previous snapshot. With nothing
    /// cached yet, an empty snapshot is returned and the next call retries.
    pub async fn snapshot(&self) -> Arc<CatalogSnapshot> {
        let cached = self.cached();
        if let Some((snapshot, loaded_at)) = &cached {
            if loaded_at.elapsed() < self.snapshot_ttl {
                return Arc::clone(snapshot);
            }
        }

        match self.refresh().await {
            Ok(snapshot) => snapshot,
            Err(e) => match cached {
                Some((stale, _)) => {
                    warn!(error = %e, items = stale.len(), "Snapshot refresh failed, keeping stale snapshot");
                    stale
                }
                None => {
                    warn!(error = %e, "Snapshot load failed, local fallback is empty");
                    Arc::new(CatalogSnapshot::default())
                }
            },
        }
    }

    /// Fetches a fresh snapshot and caches it.
    pub async fn refresh(&self) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        let items = self.service.list_catalog_snapshot().await?;
        let (snapshot, rejected) = CatalogSnapshot::from_validated(items);

        for entry in &rejected {
            warn!(sku = %entry.sku, error = %entry.error, "Skipping invalid catalog entry");
        }
        info!(items = snapshot.len(), rejected = rejected.len(), "Catalog snapshot loaded");

        let snapshot = Arc::new(snapshot.with_fetched_at(chrono::Utc::now()));
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedSnapshot {
            snapshot: Arc::clone(&snapshot),
            loaded_at: Instant::now(),
        });

        Ok(snapshot)
    }

    /// Drops the cached snapshot so the next resolution reloads it.
    pub fn invalidate(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn cached(&self) -> Option<(Arc<CatalogSnapshot>, Instant)> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| (Arc::clone(&c.snapshot), c.loaded_at))
    }

    async fn remote_lookup(
        &self,
        token: &str,
    ) -> Result<Option<mart_core::BarcodeHit>, CatalogError> {
        match tokio::time::timeout(self.remote_timeout, self.service.resolve_barcode(token)).await
        {
            Ok(result) => result,
            Err(_) => Err(CatalogError::Timeout {
                ms: self.remote_timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCatalog;
    use mart_core::{BarcodeHit, CatalogItem, Money, Tier};

    fn item(sku: &str, barcode: Option<&str>, stock: i64) -> CatalogItem {
        CatalogItem {
            sku: sku.to_string(),
            barcode: barcode.map(str::to_string),
            name: format!("Item {}", sku),
            price: Money::from_cents(1000),
            cost: Money::zero(),
            stock,
            min_stock: 0,
            is_active: true,
            unit: "pcs".to_string(),
            track_inventory: true,
        }
    }

    fn hit(sku: &str, cents: i64) -> BarcodeHit {
        BarcodeHit {
            sku: sku.to_string(),
            name: format!("Registry {}", sku),
            price: Money::from_cents(cents),
        }
    }

    fn resolver(catalog: &Arc<InMemoryCatalog>) -> CatalogResolver {
        CatalogResolver::new(catalog.clone(), &ResolverSettings::default())
    }

    #[tokio::test]
    async fn test_remote_hit_wins() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![item("MILK-1L", Some("8901234567890"), 4)]));
        catalog.register("8901234567890", hit("MILK-1L", 6500));

        let resolved = resolver(&catalog).resolve("8901234567890").await.unwrap();
        assert_eq!(resolved.tier, Tier::Remote);
        assert_eq!(resolved.unit_price.cents(), 6500);
    }

    #[tokio::test]
    async fn test_remote_hit_validated_against_snapshot() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![item("MILK-1L", None, 0)]));
        catalog.register("8901234567890", hit("MILK-1L", 6500));

        let result = resolver(&catalog).resolve("8901234567890").await;
        assert!(matches!(result, Err(ResolveFailure::OutOfStock { .. })));
    }

    #[tokio::test]
    async fn test_remote_miss_falls_back_to_snapshot() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![item("ABC123", None, 3)]));

        let resolved = resolver(&catalog).resolve("abc123").await.unwrap();
        assert_eq!(resolved.tier, Tier::Local);
        assert_eq!(resolved.sku, "ABC123");
        assert_eq!(catalog.remote_calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_soft() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![item("ABC123", None, 3)]));
        catalog.register("ABC123", hit("ABC123", 1));
        catalog.set_remote_failure(true);

        let resolved = resolver(&catalog).resolve("ABC123").await.unwrap();
        assert_eq!(resolved.tier, Tier::Local);
        assert_eq!(resolved.unit_price.cents(), 1000);
    }

    #[tokio::test]
    async fn test_invalid_registry_price_falls_back() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![item("ABC123", None, 3)]));
        catalog.register("ABC123", hit("ABC123", -500));

        let resolved = resolver(&catalog).resolve("ABC123").await.unwrap();
        assert_eq!(resolved.tier, Tier::Local);
        assert_eq!(resolved.unit_price.cents(), 1000);
        assert_eq!(catalog.remote_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_timeout_falls_back() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![item("ABC123", None, 3)]));
        catalog.register("ABC123", hit("ABC123", 1));
        catalog.set_remote_delay(Some(Duration::from_secs(5)));

        let resolved = resolver(&catalog).resolve("ABC123").await.unwrap();
        assert_eq!(resolved.tier, Tier::Local);
    }

    #[tokio::test]
    async fn test_not_found_in_both_tiers() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![item("ABC123", None, 3)]));

        let result = resolver(&catalog).resolve("ZZZ999").await;
        assert_eq!(
            result,
            Err(ResolveFailure::NotFound {
                token: "ZZZ999".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_remote_disabled_skips_registry() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![item("ABC123", None, 3)]));
        let settings = ResolverSettings {
            remote_enabled: false,
            ..ResolverSettings::default()
        };
        let resolver = CatalogResolver::new(catalog.clone(), &settings);

        resolver.resolve("ABC123").await.unwrap();
        assert_eq!(catalog.remote_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_lazy_load_and_ttl() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![item("ABC123", None, 3)]));
        let resolver = resolver(&catalog);
        assert_eq!(catalog.snapshot_calls(), 0);

        resolver.resolve("ABC123").await.unwrap();
        resolver.resolve("ABC123").await.unwrap();
        assert_eq!(catalog.snapshot_calls(), 1);

        catalog.set_items(vec![item("ABC123", None, 3), item("NEW-001", None, 1)]);
        assert!(resolver.resolve("NEW-001").await.is_err());

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(resolver.resolve("NEW-001").await.unwrap().sku, "NEW-001");
        assert_eq!(catalog.snapshot_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_snapshot_kept_on_refresh_failure() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![item("ABC123", None, 3)]));
        let resolver = resolver(&catalog);
        resolver.snapshot().await;

        catalog.set_snapshot_failure(true);
        tokio::time::advance(Duration::from_secs(301)).await;

        let snapshot = resolver.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(resolver.resolve("ABC123").await.unwrap().sku, "ABC123");
    }

    #[tokio::test]
    async fn test_first_load_failure_retries() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![item("ABC123", None, 3)]));
        catalog.set_snapshot_failure(true);
        let resolver = resolver(&catalog);

        let empty = resolver.snapshot().await;
        assert!(empty.is_empty());
        assert!(empty.fetched_at().is_none());

        catalog.set_snapshot_failure(false);
        let loaded = resolver.snapshot().await;
        assert_eq!(loaded.len(), 1);
        assert!(loaded.fetched_at().is_some());
    }

    #[tokio::test]
    async fn test_invalid_entries_skipped() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![
            item("ABC123", None, 3),
            item("BAD SKU", None, 3),
        ]));
        let resolver = resolver(&catalog);

        assert_eq!(resolver.snapshot().await.len(), 1);
        resolver.invalidate();
        assert_eq!(resolver.snapshot().await.len(), 1);
        assert_eq!(catalog.snapshot_calls(), 2);
    }
}
