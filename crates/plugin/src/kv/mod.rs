//! Namensraum-getrennter Schluessel-Wert-Speicher fuer Plugins
//!
//! Jeder Zugriff hasht zuerst `(plugin_id, schluessel)` und arbeitet dann
//! ausschliesslich mit dem gehashten Schluessel. Es gibt keinen Cache:
//! jeder Aufruf ist genau ein Lese- oder ein logischer Schreibvorgang.

pub mod hash;

use std::sync::Arc;

use plugwerk_db::{DbResult, PluginKvRecord, PluginKvRepository, UpsertStrategie};
use tracing::{debug, error};

use crate::error::{PluginError, Result};

pub use hash::schluessel_hash;

/// KV-Speicher ueber einem beliebigen [`PluginKvRepository`]
#[derive(Clone)]
pub struct PluginKvStore {
    repo: Arc<dyn PluginKvRepository>,
}

impl PluginKvStore {
    pub fn neu(repo: Arc<dyn PluginKvRepository>) -> Self {
        Self { repo }
    }

    /// Setzt einen Wert (letzter Schreibvorgang gewinnt)
    pub async fn setzen(&self, plugin_id: &str, schluessel: &str, wert: &[u8]) -> Result<()> {
        let record = PluginKvRecord::neu(schluessel_hash(plugin_id, schluessel)?, wert);
        record
            .validieren()
            .map_err(|e| PluginError::UngueltigesArgument(e.to_string()))?;

        let ergebnis = match self.repo.upsert_strategie() {
            UpsertStrategie::Atomar => self.repo.upsert(&record).await,
            UpsertStrategie::AktualisierenDannEinfuegen => {
                self.aktualisieren_dann_einfuegen(&record).await
            }
        };

        ergebnis.map_err(|e| {
            error!(plugin_id, fehler = %e, "KV-Wert konnte nicht gespeichert werden");
            PluginError::Speicher(e.to_string())
        })
    }

    /// Laedt einen Wert; `None` wenn der Schluessel nie gesetzt oder geloescht wurde
    pub async fn laden(&self, plugin_id: &str, schluessel: &str) -> Result<Option<Vec<u8>>> {
        let hash = schluessel_hash(plugin_id, schluessel)?;
        self.repo.laden(&hash).await.map_err(|e| {
            error!(plugin_id, fehler = %e, "KV-Wert konnte nicht geladen werden");
            PluginError::Speicher(e.to_string())
        })
    }

    /// Loescht einen Wert; ein fehlender Schluessel ist kein Fehler
    pub async fn loeschen(&self, plugin_id: &str, schluessel: &str) -> Result<()> {
        let hash = schluessel_hash(plugin_id, schluessel)?;
        self.repo.loeschen(&hash).await.map(|_| ()).map_err(|e| {
            error!(plugin_id, fehler = %e, "KV-Wert konnte nicht geloescht werden");
            PluginError::Speicher(e.to_string())
        })
    }

    /// Zwei-Phasen-Upsert fuer Backends ohne atomares Upsert
    ///
    /// Schlaegt das INSERT mit einer Eindeutigkeitsverletzung fehl, hat ein
    /// paralleler Schreibvorgang fuer denselben Schluessel zwischen UPDATE
    /// und INSERT gewonnen. Das Ergebnis ist dasselbe wie bei zwei
    /// aufeinanderfolgenden Schreibvorgaengen, daher gilt es als Erfolg.
    async fn aktualisieren_dann_einfuegen(&self, record: &PluginKvRecord) -> DbResult<()> {
        if self.repo.aktualisieren(record).await? > 0 {
            return Ok(());
        }
        match self.repo.einfuegen(record).await {
            Err(e) if e.ist_eindeutigkeit() => {
                debug!(schluessel = %record.schluessel, "Paralleler Schreibvorgang war schneller");
                Ok(())
            }
            sonst => sonst,
        }
    }
}
