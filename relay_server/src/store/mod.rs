//! Registration store: devices and the repositories they watch.
//!
//! Two backends implement [`RegistrationStore`]: PostgreSQL for deployments
//! and an in-process store used when no database is configured.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::device::Device;
use crate::models::repository::{Repository, RepositoryRef};

pub use memory::MemoryRegistrationStore;
pub use postgres::PgRegistrationStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(String),
}

/// Backend summary for `GET /store/info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoreInfo {
    pub backend: String,
    pub device_count: i64,
    pub repository_count: i64,
}

/// Persistence for devices and device→repository bindings.
///
/// Inserts are conditional: registering an existing device or binding
/// reports `false` instead of failing, and concurrent callers never create
/// duplicates.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Insert a device. Returns `true` if it was newly created.
    async fn register_device(&self, device_id: &str) -> Result<bool, StoreError>;

    async fn find_device(&self, device_id: &str) -> Result<Device, StoreError>;

    /// Remove a device and return the removed record.
    async fn delete_device(&self, device_id: &str) -> Result<Device, StoreError>;

    /// Bind a device to a repository, creating the repository if needed.
    /// Returns `true` if the binding was newly created.
    async fn add_device_to_repository(
        &self,
        device_id: &str,
        repository_name: &str,
    ) -> Result<bool, StoreError>;

    /// Repositories the device watches, in the order they were added.
    async fn repositories_for_device(&self, device_id: &str)
        -> Result<Vec<RepositoryRef>, StoreError>;

    async fn find_repository(&self, repository_name: &str) -> Result<Repository, StoreError>;

    async fn info(&self) -> Result<StoreInfo, StoreError>;
}
