//! Plugin-Hooks – die eine Schnittstelle fuer eingebaute und installierte Plugins
//!
//! Eingebaute Plugins werden direkt als [`PluginHooks`]-Instanz registriert.
//! Installierte Bundles werden bei der Aktivierung ueber einen
//! [`PluginLader`] zu einer Instanz gemacht.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::api::PluginApi;
use crate::manifest::{ist_relativer_pfad, PluginManifest};
use crate::router::PluginKontext;

/// Lifecycle- und Request-Hooks eines Plugins
#[async_trait]
pub trait PluginHooks: Send + Sync {
    /// Einmalig pro Instanz, bevor sie zum ersten Mal aktiviert wird
    async fn initialisieren(&self, _api: PluginApi) -> anyhow::Result<()> {
        Ok(())
    }

    /// Startet das Plugin; ein Fehler laesst es inaktiv
    async fn aktivieren(&self) -> anyhow::Result<()>;

    /// Stoppt das Plugin; ein Fehler laesst es aktiv
    async fn deaktivieren(&self) -> anyhow::Result<()>;

    /// Wird nach jeder Konfigurationsaenderung fuer aktive Plugins aufgerufen
    async fn konfiguration_geaendert(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Bearbeitet eine bereinigte HTTP-Anfrage unter `/plugins/<id>/...`
    async fn anfrage_bearbeiten(&self, anfrage: Request) -> Response;
}

/// Erzeugt Instanzen fuer installierte Bundles
pub trait PluginLader: Send + Sync {
    fn laden(
        &self,
        manifest: &PluginManifest,
        verzeichnis: &Path,
    ) -> anyhow::Result<Arc<dyn PluginHooks>>;
}

/// Standard-Lader: jedes Bundle wird zu einem [`StatischesPlugin`]
#[derive(Debug, Default, Clone, Copy)]
pub struct StatischerLader;

impl PluginLader for StatischerLader {
    fn laden(
        &self,
        manifest: &PluginManifest,
        verzeichnis: &Path,
    ) -> anyhow::Result<Arc<dyn PluginHooks>> {
        if !verzeichnis.is_dir() {
            anyhow::bail!("Bundle-Verzeichnis fehlt: {}", verzeichnis.display());
        }
        tracing::debug!(plugin_id = %manifest.id, "Statisches Plugin geladen");
        Ok(Arc::new(StatischesPlugin::neu(verzeichnis.join("public"))))
    }
}

/// Plugin ohne eigene Logik: liefert Dateien aus `public/` unter `/plugins/<id>/public/...`
#[derive(Debug, Clone)]
pub struct StatischesPlugin {
    wurzel: PathBuf,
}

impl StatischesPlugin {
    pub fn neu(wurzel: PathBuf) -> Self {
        Self { wurzel }
    }
}

#[async_trait]
impl PluginHooks for StatischesPlugin {
    async fn aktivieren(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn deaktivieren(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn anfrage_bearbeiten(&self, anfrage: Request) -> Response {
        let unterpfad = anfrage
            .extensions()
            .get::<PluginKontext>()
            .map(|k| k.unterpfad.clone())
            .unwrap_or_default();

        let Some(datei) = unterpfad.strip_prefix("public/") else {
            return StatusCode::NOT_FOUND.into_response();
        };
        if datei.is_empty() || !ist_relativer_pfad(datei) {
            return StatusCode::NOT_FOUND.into_response();
        }

        let pfad = self.wurzel.join(datei);
        match tokio::fs::read(&pfad).await {
            Ok(inhalt) => {
                let mime = mime_guess::from_path(&pfad)
                    .first_or_octet_stream()
                    .to_string();
                ([(header::CONTENT_TYPE, mime)], Body::from(inhalt)).into_response()
            }
            Err(_) => StatusCode::NOT_FOUND.into_response(),
        }
    }
}
