use color_eyre::{Result, eyre::Context};
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection};
use std::path::Path;
use std::time::Duration;

pub struct Database {
    pub conn: DatabaseConnection,
}

impl Database {
    /// Open or create a database at the given path
    pub async fn open(path: &Path) -> Result<Self> {
        log::debug!("Opening database at: {}", path.display());

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let url = format!("sqlite://{}?mode=rwc", path.display());

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(16)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .acquire_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt)
            .await
            .wrap_err_with(|| format!("Failed to open database: {}", path.display()))?;

        let database = Self::migrate(conn).await?;
        log::info!("Database ready at: {}", path.display());
        Ok(database)
    }

    /// Open a fresh in-memory database.
    ///
    /// Every pooled connection to `sqlite::memory:` sees its own database, so the
    /// pool is pinned to a single connection.
    pub async fn open_in_memory() -> Result<Self> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt)
            .await
            .wrap_err("Failed to open in-memory database")?;

        Self::migrate(conn).await
    }

    async fn migrate(conn: DatabaseConnection) -> Result<Self> {
        log::debug!("Running database migrations");
        migration::Migrator::up(&conn, None)
            .await
            .wrap_err("Failed to run database migrations")?;

        Ok(Database { conn })
    }
}
