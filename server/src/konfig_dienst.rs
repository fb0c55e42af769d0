//! Dateibasierter Konfigurationsspeicher
//!
//! Haelt die vollstaendige [`ServerConfig`] und schreibt sie bei jeder
//! Aenderung der Plugin-Einstellungen zurueck in die TOML-Datei. Erst nach
//! erfolgreichem Schreiben werden Abonnenten benachrichtigt.

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use plugwerk_plugin::{Aenderung, KonfigSpeicher, PluginEinstellungen, PluginError};
use tokio::sync::watch;
use tracing::debug;

use crate::config::ServerConfig;

pub struct DateiKonfig {
    /// `None`: nur im Speicher (Konfiguration kam nicht aus einer Datei)
    pfad: Option<PathBuf>,
    config: Mutex<ServerConfig>,
    /// Serialisiert Aenderungen samt Schreiben der Datei
    schreib_sperre: tokio::sync::Mutex<()>,
    sender: watch::Sender<PluginEinstellungen>,
}

impl DateiKonfig {
    pub fn neu(config: ServerConfig, pfad: Option<PathBuf>) -> Self {
        let (sender, _) = watch::channel(config.plugins.clone());
        Self {
            pfad,
            config: Mutex::new(config),
            schreib_sperre: tokio::sync::Mutex::new(()),
            sender,
        }
    }

    /// Kopie der vollstaendigen Konfiguration
    pub fn config(&self) -> ServerConfig {
        self.config.lock().clone()
    }
}

#[async_trait]
impl KonfigSpeicher for DateiKonfig {
    fn einstellungen(&self) -> PluginEinstellungen {
        self.sender.borrow().clone()
    }

    async fn aktualisieren(&self, aenderung: Aenderung<'_>) -> plugwerk_plugin::Result<()> {
        let _guard = self.schreib_sperre.lock().await;

        let mut neu = self.config();
        aenderung(&mut neu.plugins);
        if neu.plugins == self.config.lock().plugins {
            return Ok(());
        }

        if let Some(pfad) = &self.pfad {
            let inhalt = neu
                .als_toml()
                .map_err(|e| PluginError::Konfiguration(format!("{e:#}")))?;
            tokio::fs::write(pfad, inhalt).await.map_err(|e| {
                PluginError::Konfiguration(format!(
                    "Konfigurationsdatei '{}' nicht schreibbar: {e}",
                    pfad.display()
                ))
            })?;
            debug!(pfad = %pfad.display(), "Konfiguration gespeichert");
        }

        let einstellungen = neu.plugins.clone();
        *self.config.lock() = neu;
        self.sender.send_replace(einstellungen);
        Ok(())
    }

    fn abonnieren(&self) -> watch::Receiver<PluginEinstellungen> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jira_einschalten(e: &mut PluginEinstellungen) {
        e.zustaende.entry("jira".into()).or_default().aktiviert = true;
    }

    #[tokio::test]
    async fn aenderung_wird_geschrieben_und_gemeldet() {
        let dir = tempfile::TempDir::new().unwrap();
        let pfad = dir.path().join("config.toml");
        let konfig = DateiKonfig::neu(ServerConfig::default(), Some(pfad.clone()));
        let mut rx = konfig.abonnieren();

        konfig.aktualisieren(&mut jira_einschalten).await.unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow().plugin_aktiviert("jira"));
        assert!(konfig.config().plugins.plugin_aktiviert("jira"));

        let gespeichert = ServerConfig::laden(&pfad).unwrap();
        assert!(gespeichert.plugins.plugin_aktiviert("jira"));
    }

    #[tokio::test]
    async fn ohne_aenderung_keine_meldung() {
        let konfig = DateiKonfig::neu(ServerConfig::default(), None);
        let rx = konfig.abonnieren();
        konfig
            .aktualisieren(&mut |_: &mut PluginEinstellungen| {})
            .await
            .unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn schreibfehler_laesst_zustand_unveraendert() {
        let dir = tempfile::TempDir::new().unwrap();
        let pfad = dir.path().join("fehlt").join("config.toml");
        let konfig = DateiKonfig::neu(ServerConfig::default(), Some(pfad));
        let rx = konfig.abonnieren();

        let err = konfig.aktualisieren(&mut jira_einschalten).await.unwrap_err();
        assert!(matches!(err, PluginError::Konfiguration(_)));
        assert!(!konfig.einstellungen().plugin_aktiviert("jira"));
        assert!(!rx.has_changed().unwrap());
    }
}
