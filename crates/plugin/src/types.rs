//! Grundlegende Typen fuer das Plugin-System

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::manifest::PluginManifest;

/// Ein bekanntes Plugin: installiertes Bundle oder eingebautes Plugin
#[derive(Debug, Clone)]
pub struct InstalliertesPlugin {
    pub manifest: PluginManifest,
    /// Bundle-Verzeichnis im Suchpfad; `None` fuer eingebaute Plugins
    pub verzeichnis: Option<PathBuf>,
}

impl InstalliertesPlugin {
    pub fn ist_eingebaut(&self) -> bool {
        self.verzeichnis.is_none()
    }
}

/// Antwort fuer die Plugin-Liste der Admin-API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginsAntwort {
    pub aktiv: Vec<PluginManifest>,
    pub inaktiv: Vec<PluginManifest>,
}
