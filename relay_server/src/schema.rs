//! Diesel table definitions for the registration store.
//!
//! Tables: relay_devices, relay_repositories, relay_repository_devices.
//! `relay_repository_devices.id` carries insertion order for listings.

diesel::table! {
    relay_devices (device_id) {
        device_id -> Varchar,
        create_date -> Timestamptz,
    }
}

diesel::table! {
    relay_repositories (name) {
        name -> Varchar,
        create_date -> Timestamptz,
    }
}

diesel::table! {
    relay_repository_devices (id) {
        id -> Int8,
        repository_name -> Varchar,
        device_id -> Varchar,
        create_date -> Timestamptz,
    }
}

diesel::joinable!(relay_repository_devices -> relay_repositories (repository_name));

diesel::allow_tables_to_appear_in_same_query!(
    relay_devices,
    relay_repositories,
    relay_repository_devices,
);
