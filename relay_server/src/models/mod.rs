//! Registration data models.

pub mod device;
pub mod repository;
