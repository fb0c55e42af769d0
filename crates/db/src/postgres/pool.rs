//! PostgreSQL Connection Pool

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::error::DbError;
use crate::repository::{DatabaseConfig, UpsertStrategie};

/// Wrapper um den PostgreSQL Connection Pool
#[derive(Debug, Clone)]
pub struct PostgresDb {
    pub(crate) pool: PgPool,
    pub(crate) upsert: UpsertStrategie,
}

impl PostgresDb {
    /// Verbindet sich mit der Datenbank und fuehrt Migrationen aus
    pub async fn oeffnen(config: &DatabaseConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_verbindungen)
            .connect(&config.url)
            .await?;

        let upsert = config.effektive_upsert_strategie();
        info!(max_verbindungen = config.max_verbindungen, ?upsert, "PostgreSQL-Pool geoeffnet");

        let db = Self { pool, upsert };
        db.migrationen_ausfuehren().await?;
        Ok(db)
    }

    /// Fuehrt alle ausstehenden Migrationen aus
    pub async fn migrationen_ausfuehren(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations/postgres").run(&self.pool).await?;
        info!("Datenbank-Migrationen abgeschlossen");
        Ok(())
    }

    /// Gibt den internen Pool zurueck
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
