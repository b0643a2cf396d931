//! relay.device: A push target identified by its device token.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::relay_devices;

/// A registered device. Serializes as `{"DeviceId": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = relay_devices)]
#[serde(rename_all = "PascalCase")]
pub struct Device {
    pub device_id: String,
}

impl Device {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = relay_devices)]
pub struct NewDevice<'a> {
    pub device_id: &'a str,
}
