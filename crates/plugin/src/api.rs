//! Plugin-API – die Faehigkeiten, die ein aktives Plugin vom Host erhaelt
//!
//! Derzeit nur der KV-Speicher. Alle Zugriffe sind implizit auf die
//! eigene Plugin-ID beschraenkt.

use crate::error::Result;
use crate::kv::PluginKvStore;

/// Handle das jedes Plugin bei der Initialisierung bekommt
#[derive(Clone)]
pub struct PluginApi {
    plugin_id: String,
    kv: PluginKvStore,
}

impl PluginApi {
    pub fn neu(plugin_id: impl Into<String>, kv: PluginKvStore) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            kv,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub async fn kv_setzen(&self, schluessel: &str, wert: &[u8]) -> Result<()> {
        self.kv.setzen(&self.plugin_id, schluessel, wert).await
    }

    pub async fn kv_laden(&self, schluessel: &str) -> Result<Option<Vec<u8>>> {
        self.kv.laden(&self.plugin_id, schluessel).await
    }

    pub async fn kv_loeschen(&self, schluessel: &str) -> Result<()> {
        self.kv.loeschen(&self.plugin_id, schluessel).await
    }
}

impl std::fmt::Debug for PluginApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginApi")
            .field("plugin_id", &self.plugin_id)
            .finish_non_exhaustive()
    }
}
