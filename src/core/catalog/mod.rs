//! Remote package catalog: the records it returns, the client seam the
//! engine talks to, and helpers for turning a version into a record.

mod modrinth;
mod records;
mod retry;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::core::error::PackResult;

pub use modrinth::{ModrinthClient, DEFAULT_CATALOG_URL};
pub use records::{
    best_hash, project_type_folder, select_file, targets_any_loader, FileRecord, ProjectRecord,
    VersionRecord, VersionRef,
};
pub use retry::RateLimitRetry;

/// Query surface of the remote catalog.
///
/// Every call fails with `PackError::Remote` on a non-2xx answer. Hashes the
/// catalog does not know are simply absent from a lookup result.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn lookup_by_hashes(
        &self,
        hashes: &[String],
        algorithm: &str,
    ) -> PackResult<HashMap<String, VersionRef>>;

    async fn get_project(&self, id: &str) -> PackResult<ProjectRecord>;

    async fn get_projects(&self, ids: &[String]) -> PackResult<Vec<ProjectRecord>>;

    async fn get_version(&self, id: &str) -> PackResult<VersionRecord>;
}
