//! plugwerk-db – Datenbank-Abstraktion
//!
//! Dieses Crate stellt den Schluessel-Wert-Speicher der Plugins bereit.
//! SQLite (Standard) und PostgreSQL (Multi-Instance) liegen hinter dem
//! gemeinsamen [`PluginKvRepository`]-Trait; welche Upsert-Strategie ein
//! Backend verwendet, bestimmt [`UpsertStrategie`].

pub mod error;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod sqlite;

use std::sync::Arc;

pub use error::DbError;
pub use models::{PluginKvRecord, KV_SCHLUESSEL_MAX_ZEICHEN, KV_WERT_MAX_BYTES};
pub use postgres::PostgresDb;
pub use repository::{
    DatabaseBackend, DatabaseConfig, DbResult, PluginKvRepository, UpsertStrategie,
};
pub use sqlite::SqliteDb;

/// Oeffnet das konfigurierte Backend und liefert es als Trait-Objekt
pub async fn kv_repository_oeffnen(
    config: &DatabaseConfig,
) -> DbResult<Arc<dyn PluginKvRepository>> {
    match config.backend {
        DatabaseBackend::Sqlite => Ok(Arc::new(SqliteDb::oeffnen(config).await?)),
        DatabaseBackend::Postgres => Ok(Arc::new(PostgresDb::oeffnen(config).await?)),
    }
}
