//! Catalog service interface.
//!
//! The catalog service owns item data. The scan path uses it twice: as the
//! remote barcode registry (tier 1) and as the source of the local snapshot
//! (tier 2).

use async_trait::async_trait;
use mart_core::{BarcodeHit, CatalogItem};

use crate::error::CatalogError;

#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Looks a scanned code up in the remote registry.
    ///
    /// `Ok(None)` is a clean miss; `Err` is a transport failure. Both send
    /// the resolver to the local snapshot.
    async fn resolve_barcode(&self, code: &str) -> Result<Option<BarcodeHit>, CatalogError>;

    /// Returns the full catalog for the local fallback tier.
    async fn list_catalog_snapshot(&self) -> Result<Vec<CatalogItem>, CatalogError>;
}
