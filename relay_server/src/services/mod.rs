//! Relay services: status analysis, history lookup, push delivery.

pub mod decision;
pub mod dispatcher;
pub mod github_service;
pub mod push_service;
