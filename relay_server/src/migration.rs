//! Schema migration for the registration store.

use diesel_async::{AsyncPgConnection, SimpleAsyncConnection};

/// SQL migration for relay tables.
///
/// Every statement is idempotent so the migration runs on each startup.
pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS relay_devices (
    device_id       VARCHAR(255) PRIMARY KEY,
    create_date     TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS relay_repositories (
    name            VARCHAR(255) PRIMARY KEY,
    create_date     TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS relay_repository_devices (
    id              BIGSERIAL PRIMARY KEY,
    repository_name VARCHAR(255) NOT NULL REFERENCES relay_repositories(name) ON DELETE CASCADE,
    device_id       VARCHAR(255) NOT NULL,
    create_date     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (repository_name, device_id)
);

CREATE INDEX IF NOT EXISTS idx_relay_repository_devices_device ON relay_repository_devices (device_id);
"#;

/// Run the relay migration.
pub async fn run_migration(conn: &mut AsyncPgConnection) -> anyhow::Result<()> {
    conn.batch_execute(MIGRATION_SQL)
        .await
        .map_err(|e| anyhow::anyhow!("relay migration failed: {e}"))?;
    Ok(())
}
