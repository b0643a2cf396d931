//! PostgreSQL registration store (diesel-async + deadpool).

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use super::{RegistrationStore, StoreError, StoreInfo};
use crate::models::device::{Device, NewDevice};
use crate::models::repository::{NewRepository, NewRepositoryDevice, Repository, RepositoryRef};
use crate::schema::{relay_devices, relay_repositories, relay_repository_devices};

pub type PgPool = Pool<AsyncPgConnection>;

pub struct PgRegistrationStore {
    pool: PgPool,
}

impl PgRegistrationStore {
    pub fn connect(database_url: &str, max_connections: usize) -> Result<Self, StoreError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager)
            .max_size(max_connections)
            .build()
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Create the relay tables if they do not exist yet.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        tracing::info!("Running relay migration...");
        crate::migration::run_migration(&mut conn).await?;
        tracing::info!("Relay migration completed.");
        Ok(())
    }

    async fn conn(&self) -> Result<Object<AsyncPgConnection>, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl RegistrationStore for PgRegistrationStore {
    async fn register_device(&self, device_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        Ok(insert_device(&mut conn, device_id).await?)
    }

    async fn find_device(&self, device_id: &str) -> Result<Device, StoreError> {
        let mut conn = self.conn().await?;
        find_device(&mut conn, device_id)
            .await?
            .ok_or_else(|| StoreError::DeviceNotFound(device_id.to_string()))
    }

    async fn delete_device(&self, device_id: &str) -> Result<Device, StoreError> {
        let mut conn = self.conn().await?;
        delete_device(&mut conn, device_id)
            .await?
            .ok_or_else(|| StoreError::DeviceNotFound(device_id.to_string()))
    }

    async fn add_device_to_repository(
        &self,
        device_id: &str,
        repository_name: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        Ok(insert_binding(&mut conn, device_id, repository_name).await?)
    }

    async fn repositories_for_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<RepositoryRef>, StoreError> {
        let mut conn = self.conn().await?;
        let names = repositories_for_device(&mut conn, device_id).await?;
        Ok(names.into_iter().map(RepositoryRef::new).collect())
    }

    async fn find_repository(&self, repository_name: &str) -> Result<Repository, StoreError> {
        let mut conn = self.conn().await?;
        find_repository(&mut conn, repository_name)
            .await?
            .ok_or_else(|| StoreError::RepositoryNotFound(repository_name.to_string()))
    }

    async fn info(&self) -> Result<StoreInfo, StoreError> {
        let mut conn = self.conn().await?;
        let device_count: i64 = relay_devices::table
            .count()
            .get_result(&mut *conn)
            .await?;
        let repository_count: i64 = relay_repositories::table
            .count()
            .get_result(&mut *conn)
            .await?;
        Ok(StoreInfo {
            backend: "postgres".to_string(),
            device_count,
            repository_count,
        })
    }
}

/// Insert a device unless it already exists. Returns `true` on insert.
pub async fn insert_device(conn: &mut AsyncPgConnection, device_id: &str) -> QueryResult<bool> {
    let inserted = diesel::insert_into(relay_devices::table)
        .values(&NewDevice { device_id })
        .on_conflict_do_nothing()
        .execute(conn)
        .await?;
    Ok(inserted == 1)
}

pub async fn find_device(
    conn: &mut AsyncPgConnection,
    device_id: &str,
) -> QueryResult<Option<Device>> {
    relay_devices::table
        .find(device_id)
        .select(Device::as_select())
        .first(conn)
        .await
        .optional()
}

/// Delete a device, returning the removed row if there was one.
pub async fn delete_device(
    conn: &mut AsyncPgConnection,
    device_id: &str,
) -> QueryResult<Option<Device>> {
    diesel::delete(relay_devices::table.find(device_id))
        .returning(Device::as_returning())
        .get_result(conn)
        .await
        .optional()
}

/// Bind a device to a repository. Both inserts are conditional, so repeated
/// or concurrent calls leave exactly one binding.
pub async fn insert_binding(
    conn: &mut AsyncPgConnection,
    device_id: &str,
    repository_name: &str,
) -> QueryResult<bool> {
    diesel::insert_into(relay_repositories::table)
        .values(&NewRepository {
            name: repository_name,
        })
        .on_conflict_do_nothing()
        .execute(conn)
        .await?;

    let inserted = diesel::insert_into(relay_repository_devices::table)
        .values(&NewRepositoryDevice {
            repository_name,
            device_id,
        })
        .on_conflict_do_nothing()
        .execute(conn)
        .await?;
    Ok(inserted == 1)
}

pub async fn repositories_for_device(
    conn: &mut AsyncPgConnection,
    device_id: &str,
) -> QueryResult<Vec<String>> {
    relay_repository_devices::table
        .filter(relay_repository_devices::device_id.eq(device_id))
        .order(relay_repository_devices::id.asc())
        .select(relay_repository_devices::repository_name)
        .load(conn)
        .await
}

pub async fn find_repository(
    conn: &mut AsyncPgConnection,
    repository_name: &str,
) -> QueryResult<Option<Repository>> {
    let name: Option<String> = relay_repositories::table
        .find(repository_name)
        .select(relay_repositories::name)
        .first(conn)
        .await
        .optional()?;

    let Some(name) = name else {
        return Ok(None);
    };

    let device_list: Vec<String> = relay_repository_devices::table
        .filter(relay_repository_devices::repository_name.eq(name.as_str()))
        .order(relay_repository_devices::id.asc())
        .select(relay_repository_devices::device_id)
        .load(conn)
        .await?;

    Ok(Some(Repository { name, device_list }))
}
