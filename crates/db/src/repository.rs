//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt den KV-Speicher der Plugins von der
//! konkreten Datenbank-Implementierung. Beide Backends implementieren
//! sowohl das atomare Upsert als auch die Einzelschritte
//! Aktualisieren/Einfuegen; welche Variante der Aufrufer nutzt, legt
//! [`PluginKvRepository::upsert_strategie`] fest.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DbError;
use crate::models::PluginKvRecord;

/// Result-Alias fuer Repository-Operationen
pub type DbResult<T> = Result<T, DbError>;

/// Unterstuetzte Datenbank-Backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// SQLite – Standard fuer Single-Instance-Betrieb
    Sqlite,
    /// PostgreSQL – fuer Multi-Instance-Betrieb
    Postgres,
}

impl DatabaseBackend {
    /// Upsert-Strategie die ohne explizite Konfiguration verwendet wird
    pub fn standard_upsert(&self) -> UpsertStrategie {
        match self {
            Self::Sqlite => UpsertStrategie::Atomar,
            Self::Postgres => UpsertStrategie::AktualisierenDannEinfuegen,
        }
    }
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "SQLite"),
            Self::Postgres => write!(f, "PostgreSQL"),
        }
    }
}

/// Wie ein Schreibvorgang im KV-Speicher umgesetzt wird
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertStrategie {
    /// Eine Anweisung: einfuegen oder bei Konflikt ueberschreiben
    Atomar,
    /// UPDATE, bei 0 Zeilen INSERT; Eindeutigkeitsverletzung beim INSERT
    /// bedeutet, dass ein paralleler Schreibvorgang gewonnen hat
    AktualisierenDannEinfuegen,
}

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Ausgewaehltes Backend
    pub backend: DatabaseBackend,
    /// Verbindungs-URL (z.B. "sqlite://plugwerk.db" oder "postgres://...")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
    /// Ueberschreibt die Standard-Strategie des Backends
    pub upsert_strategie: Option<UpsertStrategie>,
}

impl DatabaseConfig {
    /// Tatsaechlich verwendete Upsert-Strategie
    pub fn effektive_upsert_strategie(&self) -> UpsertStrategie {
        self.upsert_strategie
            .unwrap_or_else(|| self.backend.standard_upsert())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            url: "sqlite://plugwerk.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
            upsert_strategie: None,
        }
    }
}

/// Repository fuer den Schluessel-Wert-Speicher der Plugins
///
/// Alle Schluessel sind bereits gehasht; das Repository kennt keine
/// Plugin-IDs.
#[async_trait]
pub trait PluginKvRepository: Send + Sync {
    /// Strategie mit der dieses Backend Schreibvorgaenge ausfuehren soll
    fn upsert_strategie(&self) -> UpsertStrategie;

    /// Atomares Einfuegen-oder-Ueberschreiben in einer Anweisung
    async fn upsert(&self, record: &PluginKvRecord) -> DbResult<()>;

    /// Ueberschreibt einen vorhandenen Wert, liefert die Anzahl betroffener Zeilen
    async fn aktualisieren(&self, record: &PluginKvRecord) -> DbResult<u64>;

    /// Fuegt einen neuen Datensatz ein
    ///
    /// Existiert der Schluessel bereits, schlaegt der Aufruf mit
    /// [`DbError::Eindeutigkeit`] fehl.
    async fn einfuegen(&self, record: &PluginKvRecord) -> DbResult<()>;

    /// Laedt den Wert zu einem Schluessel
    async fn laden(&self, schluessel: &str) -> DbResult<Option<Vec<u8>>>;

    /// Loescht einen Schluessel, liefert ob ein Datensatz existierte
    async fn loeschen(&self, schluessel: &str) -> DbResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_config_standard() {
        let cfg = DatabaseConfig::default();
        assert_eq!(cfg.backend, DatabaseBackend::Sqlite);
        assert!(cfg.sqlite_wal);
        assert_eq!(cfg.max_verbindungen, 5);
        assert_eq!(cfg.effektive_upsert_strategie(), UpsertStrategie::Atomar);
    }

    #[test]
    fn postgres_nutzt_zweiphasiges_upsert() {
        let cfg = DatabaseConfig {
            backend: DatabaseBackend::Postgres,
            ..Default::default()
        };
        assert_eq!(
            cfg.effektive_upsert_strategie(),
            UpsertStrategie::AktualisierenDannEinfuegen
        );
    }

    #[test]
    fn strategie_ueberschreibbar() {
        let cfg = DatabaseConfig {
            upsert_strategie: Some(UpsertStrategie::AktualisierenDannEinfuegen),
            ..Default::default()
        };
        assert_eq!(
            cfg.effektive_upsert_strategie(),
            UpsertStrategie::AktualisierenDannEinfuegen
        );
    }

    #[test]
    fn backend_anzeige() {
        assert_eq!(DatabaseBackend::Sqlite.to_string(), "SQLite");
        assert_eq!(DatabaseBackend::Postgres.to_string(), "PostgreSQL");
    }
}
