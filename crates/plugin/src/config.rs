//! Plugin-Einstellungen und Konfigurationsspeicher
//!
//! Der [`KonfigSpeicher`] ist die Quelle des Soll-Zustands: globaler
//! Schalter und ein `aktiviert`-Flag pro Plugin-ID. Aenderungen werden
//! ueber einen `watch`-Kanal an den Abgleich gemeldet.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;

/// Einstellungen des Plugin-Systems (`[plugins]` in der Konfigurationsdatei)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginEinstellungen {
    /// Globaler Schalter fuer das Plugin-System
    pub aktiviert: bool,
    /// Suchpfad: ein Unterverzeichnis pro installiertem Plugin
    pub verzeichnis: PathBuf,
    /// Zielverzeichnis fuer die Web-Client-Bundles aktiver Plugins
    pub webapp_verzeichnis: PathBuf,
    /// Basisverzeichnis fuer temporaere Entpack-Verzeichnisse (Standard: System-Temp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_verzeichnis: Option<PathBuf>,
    /// Ob `?access_token=` als Credential akzeptiert wird
    pub token_in_query_erlauben: bool,
    /// Soll-Zustand pro Plugin-ID
    pub zustaende: BTreeMap<String, PluginZustand>,
}

impl Default for PluginEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            verzeichnis: PathBuf::from("plugins"),
            webapp_verzeichnis: PathBuf::from("client/plugins"),
            temp_verzeichnis: None,
            token_in_query_erlauben: true,
            zustaende: BTreeMap::new(),
        }
    }
}

impl PluginEinstellungen {
    /// Soll das Plugin laufen? Fehlender Eintrag bedeutet deaktiviert.
    pub fn plugin_aktiviert(&self, id: &str) -> bool {
        self.zustaende.get(id).is_some_and(|z| z.aktiviert)
    }
}

/// Persistierter Soll-Zustand eines Plugins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginZustand {
    pub aktiviert: bool,
}

/// Aenderungsfunktion fuer [`KonfigSpeicher::aktualisieren`]
pub type Aenderung<'a> = &'a mut (dyn FnMut(&mut PluginEinstellungen) + Send);

/// Schnittstelle zum Konfigurationssystem
#[async_trait]
pub trait KonfigSpeicher: Send + Sync {
    /// Aktueller Stand der Plugin-Einstellungen
    fn einstellungen(&self) -> PluginEinstellungen;

    /// Aendert die Einstellungen, persistiert sie und benachrichtigt Abonnenten
    async fn aktualisieren(&self, aenderung: Aenderung<'_>) -> Result<()>;

    /// Abonniert Aenderungen
    fn abonnieren(&self) -> watch::Receiver<PluginEinstellungen>;
}

/// Nicht-persistenter Konfigurationsspeicher (Tests, eingebettete Nutzung)
#[derive(Debug)]
pub struct SpeicherKonfig {
    sender: watch::Sender<PluginEinstellungen>,
}

impl SpeicherKonfig {
    pub fn neu(einstellungen: PluginEinstellungen) -> Self {
        let (sender, _) = watch::channel(einstellungen);
        Self { sender }
    }

    /// Synchrone Aenderung; Abonnenten werden immer benachrichtigt
    pub fn aendern(&self, aenderung: impl FnOnce(&mut PluginEinstellungen)) {
        self.sender.send_modify(aenderung);
    }
}

#[async_trait]
impl KonfigSpeicher for SpeicherKonfig {
    fn einstellungen(&self) -> PluginEinstellungen {
        self.sender.borrow().clone()
    }

    async fn aktualisieren(&self, aenderung: Aenderung<'_>) -> Result<()> {
        self.aendern(|e| aenderung(e));
        Ok(())
    }

    fn abonnieren(&self) -> watch::Receiver<PluginEinstellungen> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardwerte() {
        let e = PluginEinstellungen::default();
        assert!(e.aktiviert);
        assert!(e.token_in_query_erlauben);
        assert!(e.zustaende.is_empty());
        assert!(!e.plugin_aktiviert("jira"));
    }

    #[test]
    fn toml_mit_zustaenden() {
        let e: PluginEinstellungen = toml::from_str(
            r#"
verzeichnis = "/var/lib/plugwerk/plugins"

[zustaende.jira]
aktiviert = true

[zustaende.zoom]
aktiviert = false
"#,
        )
        .unwrap();
        assert!(e.aktiviert);
        assert!(e.plugin_aktiviert("jira"));
        assert!(!e.plugin_aktiviert("zoom"));
        assert!(!e.plugin_aktiviert("unbekannt"));
    }

    #[tokio::test]
    async fn aenderung_wird_gemeldet() {
        let konfig = SpeicherKonfig::neu(PluginEinstellungen::default());
        let mut rx = konfig.abonnieren();

        konfig
            .aktualisieren(&mut |e: &mut PluginEinstellungen| {
                e.zustaende.entry("jira".into()).or_default().aktiviert = true;
            })
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow().plugin_aktiviert("jira"));
        assert!(konfig.einstellungen().plugin_aktiviert("jira"));
    }
}
