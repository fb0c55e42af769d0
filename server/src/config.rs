//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::path::Path;

use plugwerk_db::{DatabaseBackend, DatabaseConfig, UpsertStrategie};
use plugwerk_plugin::PluginEinstellungen;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Datenbank-Einstellungen (KV-Speicher der Plugins)
    pub datenbank: DatenbankEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Session-Einstellungen
    pub sessions: SessionEinstellungen,
    /// Plugin-Einstellungen inkl. Soll-Zustand pro Plugin
    pub plugins: PluginEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Plugwerk".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP
    pub bind_adresse: String,
    /// Port fuer Plugin-Routen, Admin-API und Webapp-Bundles
    pub http_port: u16,
    /// CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 8065,
            cors_origins: vec![],
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Datenbank-Typ: "sqlite" oder "postgres"
    pub typ: String,
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// WAL-Modus fuer SQLite
    pub sqlite_wal: bool,
    /// Ueberschreibt die Upsert-Strategie des Backends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upsert_strategie: Option<UpsertStrategie>,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            typ: "sqlite".into(),
            url: "sqlite://plugwerk.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
            upsert_strategie: None,
        }
    }
}

impl DatenbankEinstellungen {
    /// Wandelt die Einstellungen in die Konfiguration der Datenbankschicht um
    pub fn datenbank_config(&self) -> anyhow::Result<DatabaseConfig> {
        let backend = match self.typ.to_ascii_lowercase().as_str() {
            "sqlite" => DatabaseBackend::Sqlite,
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            anderer => anyhow::bail!("Unbekannter Datenbank-Typ: '{anderer}'"),
        };
        Ok(DatabaseConfig {
            backend,
            url: self.url.clone(),
            max_verbindungen: self.max_verbindungen,
            sqlite_wal: self.sqlite_wal,
            upsert_strategie: self.upsert_strategie,
        })
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Session-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEinstellungen {
    /// Lebensdauer einer Session in Sekunden
    pub ttl_sekunden: u64,
    /// Token fuer die Admin-API (leer = Admin-API gesperrt)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

impl Default for SessionEinstellungen {
    fn default() -> Self {
        Self {
            ttl_sekunden: 24 * 3600,
            admin_token: None,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: impl AsRef<Path>) -> anyhow::Result<Self> {
        let pfad = pfad.as_ref();
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt).map_err(|e| {
                    anyhow::anyhow!("Konfigurationsfehler in '{}': {e}", pfad.display())
                })?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = %pfad.display(),
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{}' nicht lesbar: {e}",
                pfad.display()
            )),
        }
    }

    /// Schreibt die Konfiguration als TOML
    pub fn speichern(&self, pfad: impl AsRef<Path>) -> anyhow::Result<()> {
        let pfad = pfad.as_ref();
        let inhalt = self.als_toml()?;
        std::fs::write(pfad, inhalt).map_err(|e| {
            anyhow::anyhow!("Konfigurationsdatei '{}' nicht schreibbar: {e}", pfad.display())
        })
    }

    /// Serialisiert die Konfiguration im Format der Konfigurationsdatei
    pub fn als_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Gibt die Bind-Adresse fuer den HTTP-Server zurueck
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.http_port)
    }
}
