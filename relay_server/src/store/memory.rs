//! In-process registration store.
//!
//! Used when no `DATABASE_URL` is configured and as the store behind the
//! router tests. Every operation holds the lock across its check and insert,
//! which gives the same conditional-insert guarantees as the database.

use std::collections::HashSet;
use std::hash::Hash;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RegistrationStore, StoreError, StoreInfo};
use crate::models::device::Device;
use crate::models::repository::{Repository, RepositoryRef};

/// Deduplicated collection that remembers insertion order.
#[derive(Debug)]
struct OrderedSet<T> {
    members: HashSet<T>,
    order: Vec<T>,
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self {
            members: HashSet::new(),
            order: Vec::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> OrderedSet<T> {
    /// Returns `false` when the value was already present.
    fn insert(&mut self, value: T) -> bool {
        if !self.members.insert(value.clone()) {
            return false;
        }
        self.order.push(value);
        true
    }

    fn contains(&self, value: &T) -> bool {
        self.members.contains(value)
    }

    fn remove(&mut self, value: &T) -> Option<T> {
        let removed = self.members.take(value)?;
        self.order.retain(|v| v != value);
        Some(removed)
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter()
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    devices: OrderedSet<String>,
    repositories: OrderedSet<String>,
    /// (repository, device) pairs in insertion order.
    bindings: OrderedSet<(String, String)>,
}

#[derive(Debug, Default)]
pub struct MemoryRegistrationStore {
    state: RwLock<MemoryState>,
}

impl MemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistrationStore for MemoryRegistrationStore {
    async fn register_device(&self, device_id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.devices.insert(device_id.to_string()))
    }

    async fn find_device(&self, device_id: &str) -> Result<Device, StoreError> {
        let state = self.state.read().await;
        if state.devices.contains(&device_id.to_string()) {
            Ok(Device::new(device_id))
        } else {
            Err(StoreError::DeviceNotFound(device_id.to_string()))
        }
    }

    async fn delete_device(&self, device_id: &str) -> Result<Device, StoreError> {
        let mut state = self.state.write().await;
        state
            .devices
            .remove(&device_id.to_string())
            .map(Device::new)
            .ok_or_else(|| StoreError::DeviceNotFound(device_id.to_string()))
    }

    async fn add_device_to_repository(
        &self,
        device_id: &str,
        repository_name: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        state.repositories.insert(repository_name.to_string());
        Ok(state
            .bindings
            .insert((repository_name.to_string(), device_id.to_string())))
    }

    async fn repositories_for_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<RepositoryRef>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .bindings
            .iter()
            .filter(|(_, device)| device == device_id)
            .map(|(repo, _)| RepositoryRef::new(repo.clone()))
            .collect())
    }

    async fn find_repository(&self, repository_name: &str) -> Result<Repository, StoreError> {
        let state = self.state.read().await;
        if !state.repositories.contains(&repository_name.to_string()) {
            return Err(StoreError::RepositoryNotFound(repository_name.to_string()));
        }
        let device_list = state
            .bindings
            .iter()
            .filter(|(repo, _)| repo == repository_name)
            .map(|(_, device)| device.clone())
            .collect();
        Ok(Repository {
            name: repository_name.to_string(),
            device_list,
        })
    }

    async fn info(&self) -> Result<StoreInfo, StoreError> {
        let state = self.state.read().await;
        Ok(StoreInfo {
            backend: "memory".to_string(),
            device_count: state.devices.len() as i64,
            repository_count: state.repositories.len() as i64,
        })
    }
}
