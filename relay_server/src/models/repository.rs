//! relay.repository: A watched repository and the devices bound to it.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{relay_repositories, relay_repository_devices};

/// A repository with its device set, in binding order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Repository {
    pub name: String,
    pub device_list: Vec<String>,
}

/// Repository reference as it appears in device listings and request bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepositoryRef {
    pub name: String,
}

impl RepositoryRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = relay_repositories)]
pub struct NewRepository<'a> {
    pub name: &'a str,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = relay_repository_devices)]
pub struct NewRepositoryDevice<'a> {
    pub repository_name: &'a str,
    pub device_id: &'a str,
}
