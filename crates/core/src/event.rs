//! Event-Bus fuer systemweite Ereignisse
//!
//! Lifecycle-Ereignisse der Plugins werden ueber den Bus an alle
//! Abonnenten verteilt (z.B. den SSE-Endpunkt fuer Web-Clients).
//! Die Standard-Implementierung basiert auf `tokio::sync::broadcast`.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::PlugwerkError;

/// Kapazitaet des Broadcast-Kanals falls nicht anders angegeben
pub const STANDARD_KAPAZITAET: usize = 256;

/// Alle systemweiten Ereignisse die ueber den Event-Bus fliessen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typ", rename_all = "snake_case")]
pub enum SystemEreignis {
    /// Ein Plugin mit Client-Komponente wurde aktiviert
    PluginAktiviert {
        plugin_id: String,
        /// Client-relevanter Ausschnitt des Manifests
        manifest: serde_json::Value,
    },
    /// Ein Plugin mit Client-Komponente wurde deaktiviert
    PluginDeaktiviert {
        plugin_id: String,
        manifest: serde_json::Value,
    },
}

impl SystemEreignis {
    /// Plugin-ID auf die sich das Ereignis bezieht
    pub fn plugin_id(&self) -> &str {
        match self {
            Self::PluginAktiviert { plugin_id, .. } | Self::PluginDeaktiviert { plugin_id, .. } => {
                plugin_id
            }
        }
    }

    /// Kurzer Ereignisname (fuer SSE `event:`-Zeilen und Logs)
    pub fn name(&self) -> &'static str {
        match self {
            Self::PluginAktiviert { .. } => "plugin_aktiviert",
            Self::PluginDeaktiviert { .. } => "plugin_deaktiviert",
        }
    }
}

/// Trait fuer den Event-Bus
pub trait EventBus: Send + Sync + 'static {
    /// Sendet ein Ereignis an alle Abonnenten
    ///
    /// Ein Bus ohne Abonnenten ist kein Fehler; das Ereignis verfaellt.
    fn senden(&self, event: SystemEreignis) -> crate::Result<()>;

    /// Abonniert alle zukuenftigen Ereignisse
    fn abonnieren(&self) -> Box<dyn EventEmpfaenger>;
}

/// Empfaenger-Seite eines Event-Bus-Abonnements
#[async_trait]
pub trait EventEmpfaenger: Send {
    /// Wartet auf das naechste Ereignis; `None` wenn der Bus geschlossen ist
    async fn empfangen(&mut self) -> Option<SystemEreignis>;

    /// Liefert ein bereits anstehendes Ereignis ohne zu warten
    fn versuchen(&mut self) -> Option<SystemEreignis>;
}

/// Event-Bus auf Basis von `tokio::sync::broadcast`
///
/// Nach [`BroadcastBus::schliessen`] enden alle Abonnements und jedes
/// weitere `senden` liefert [`PlugwerkError::BusGeschlossen`].
#[derive(Debug)]
pub struct BroadcastBus {
    sender: RwLock<Option<broadcast::Sender<SystemEreignis>>>,
}

impl BroadcastBus {
    /// Erstellt einen neuen Bus mit der angegebenen Kanal-Kapazitaet
    pub fn neu(kapazitaet: usize) -> Self {
        let (sender, _) = broadcast::channel(kapazitaet.max(1));
        Self {
            sender: RwLock::new(Some(sender)),
        }
    }

    /// Anzahl aktuell verbundener Abonnenten
    pub fn anzahl_abonnenten(&self) -> usize {
        self.sender
            .read()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Schliesst den Bus; wartende Empfaenger erhalten `None`
    pub fn schliessen(&self) {
        if self.sender.write().take().is_some() {
            debug!("Event-Bus geschlossen");
        }
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.sender.read().is_none()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::neu(STANDARD_KAPAZITAET)
    }
}

impl EventBus for BroadcastBus {
    fn senden(&self, event: SystemEreignis) -> crate::Result<()> {
        let guard = self.sender.read();
        let sender = guard.as_ref().ok_or(PlugwerkError::BusGeschlossen)?;
        // Err bedeutet hier nur: niemand hoert zu
        let _ = sender.send(event);
        Ok(())
    }

    fn abonnieren(&self) -> Box<dyn EventEmpfaenger> {
        let empfaenger = match self.sender.read().as_ref() {
            Some(sender) => sender.subscribe(),
            // Kanal ohne Sender: der erste Empfang liefert sofort `None`
            None => broadcast::channel(1).1,
        };
        Box::new(BroadcastEmpfaenger { empfaenger })
    }
}

struct BroadcastEmpfaenger {
    empfaenger: broadcast::Receiver<SystemEreignis>,
}

#[async_trait]
impl EventEmpfaenger for BroadcastEmpfaenger {
    async fn empfangen(&mut self) -> Option<SystemEreignis> {
        loop {
            match self.empfaenger.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(anzahl)) => {
                    warn!(verpasst = anzahl, "Event-Abonnent zu langsam, Ereignisse verworfen");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn versuchen(&mut self) -> Option<SystemEreignis> {
        loop {
            match self.empfaenger.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(anzahl)) => {
                    warn!(verpasst = anzahl, "Event-Abonnent zu langsam, Ereignisse verworfen");
                }
                Err(_) => return None,
            }
        }
    }
}
