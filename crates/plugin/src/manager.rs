//! PluginManager – Lifecycle-Abgleich und Verwaltungsoperationen
//!
//! Zentrale Komponente die alle anderen Teile des Plugin-Systems
//! zusammenfuehrt: Soll-Zustand aus dem [`KonfigSpeicher`], Ist-Zustand aus
//! der [`PluginUmgebung`], Lifecycle-Ereignisse auf den [`EventBus`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use plugwerk_core::EventBus;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{KonfigSpeicher, PluginEinstellungen};
use crate::error::{PluginError, Result};
use crate::events::{aktiviert_melden, deaktiviert_melden};
use crate::hooks::{PluginHooks, PluginLader};
use crate::installer;
use crate::kv::PluginKvStore;
use crate::manifest::PluginManifest;
use crate::registry::PluginUmgebung;
use crate::types::PluginsAntwort;

/// Ergebnis eines Abgleich-Durchlaufs
#[derive(Debug, Default)]
pub struct AbgleichBericht {
    pub aktiviert: Vec<String>,
    pub deaktiviert: Vec<String>,
    /// Fehler pro Plugin-ID; brechen den Durchlauf nicht ab
    pub fehler: Vec<(String, PluginError)>,
}

impl AbgleichBericht {
    /// Keine Aenderung und keine Fehler
    pub fn ist_leer(&self) -> bool {
        self.aktiviert.is_empty() && self.deaktiviert.is_empty() && self.fehler.is_empty()
    }

    fn protokollieren(&self) {
        for (id, fehler) in &self.fehler {
            error!(plugin_id = %id, art = fehler.art(), fehler = %fehler, "Abgleich fuer Plugin fehlgeschlagen");
        }
        if !self.ist_leer() {
            info!(
                aktiviert = self.aktiviert.len(),
                deaktiviert = self.deaktiviert.len(),
                fehler = self.fehler.len(),
                "Plugin-Abgleich abgeschlossen"
            );
        }
    }
}

/// Abhaengigkeiten fuer [`PluginManager::starten`]
pub struct ManagerAbhaengigkeiten {
    pub konfig: Arc<dyn KonfigSpeicher>,
    pub bus: Arc<dyn EventBus>,
    pub kv: PluginKvStore,
    pub lader: Arc<dyn PluginLader>,
    /// Einkompilierte Plugins, vor dem ersten Abgleich registriert
    pub eingebaute: Vec<(PluginManifest, Arc<dyn PluginHooks>)>,
}

/// PluginManager – besitzt die Umgebung und treibt sie zum Soll-Zustand
pub struct PluginManager {
    umgebung: Arc<PluginUmgebung>,
    konfig: Arc<dyn KonfigSpeicher>,
    bus: Arc<dyn EventBus>,
    temp_basis: Option<PathBuf>,
    /// Serialisiert Abgleich-Durchlaeufe und Entfernen
    abgleich_sperre: Mutex<()>,
    /// Serialisiert Installieren und Entfernen
    installations_sperre: Mutex<()>,
    /// Nach `herunterfahren` gesetzt; kein Abgleich mehr
    heruntergefahren: AtomicBool,
    /// Beendet die Konfigurations-Beobachtung
    stopp: watch::Sender<bool>,
    beobachter: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl PluginManager {
    /// Erstellt einen Manager ueber einer bestehenden Umgebung
    pub fn neu(
        umgebung: Arc<PluginUmgebung>,
        konfig: Arc<dyn KonfigSpeicher>,
        bus: Arc<dyn EventBus>,
    ) -> Arc<Self> {
        let temp_basis = konfig.einstellungen().temp_verzeichnis;
        Arc::new(Self {
            umgebung,
            konfig,
            bus,
            temp_basis,
            abgleich_sperre: Mutex::new(()),
            installations_sperre: Mutex::new(()),
            heruntergefahren: AtomicBool::new(false),
            stopp: watch::channel(false).0,
            beobachter: parking_lot::Mutex::new(None),
        })
    }

    /// Startet das Plugin-System
    ///
    /// Liefert `None` wenn das Plugin-System global deaktiviert ist. Legt
    /// Such- und Webapp-Verzeichnis an, registriert eingebaute Plugins,
    /// fuehrt einen ersten Abgleich aus und startet die
    /// Konfigurations-Beobachtung.
    pub async fn starten(abh: ManagerAbhaengigkeiten) -> Result<Option<Arc<Self>>> {
        let einstellungen = abh.konfig.einstellungen();
        if !einstellungen.aktiviert {
            info!("Plugin-System ist deaktiviert");
            return Ok(None);
        }

        info!(suchpfad = %einstellungen.verzeichnis.display(), "Starte Plugin-System");
        for verzeichnis in [&einstellungen.verzeichnis, &einstellungen.webapp_verzeichnis] {
            tokio::fs::create_dir_all(verzeichnis).await.map_err(|e| {
                PluginError::dateisystem(&verzeichnis.display().to_string(), e)
            })?;
        }

        let umgebung = Arc::new(PluginUmgebung::neu(
            einstellungen.verzeichnis.clone(),
            einstellungen.webapp_verzeichnis.clone(),
            abh.lader,
            abh.kv,
        ));
        for (manifest, instanz) in abh.eingebaute {
            umgebung.eingebaut_registrieren(manifest, instanz).await?;
        }

        let manager = Self::neu(umgebung, abh.konfig, abh.bus);
        manager.abgleichen().await;
        manager.konfig_beobachten();
        Ok(Some(manager))
    }

    pub fn umgebung(&self) -> &Arc<PluginUmgebung> {
        &self.umgebung
    }

    /// Ob das Plugin-System laut Konfiguration eingeschaltet ist
    pub fn ist_aktiviert(&self) -> bool {
        self.konfig.einstellungen().aktiviert
    }

    fn aktiviert_pruefen(&self) -> Result<()> {
        if self.ist_aktiviert() {
            Ok(())
        } else {
            Err(PluginError::Deaktiviert)
        }
    }

    /// Bringt die aktive Menge in Deckung mit dem konfigurierten Soll-Zustand
    ///
    /// Fehler einzelner Plugins werden gesammelt und blockieren die anderen
    /// nicht. Ein zweiter Durchlauf direkt danach aendert nichts.
    pub async fn abgleichen(&self) -> AbgleichBericht {
        let _guard = self.abgleich_sperre.lock().await;
        let mut bericht = AbgleichBericht::default();

        if self.heruntergefahren.load(Ordering::SeqCst) {
            debug!("Abgleich nach dem Herunterfahren uebersprungen");
            return bericht;
        }
        let einstellungen = self.konfig.einstellungen();
        if !einstellungen.aktiviert {
            return bericht;
        }

        let plugins = match self.umgebung.plugins().await {
            Ok(plugins) => plugins,
            Err(e) => {
                error!(fehler = %e, "Installierte Plugins konnten nicht ermittelt werden");
                return bericht;
            }
        };

        for plugin in plugins {
            let id = plugin.manifest.id;
            let soll = einstellungen.plugin_aktiviert(&id);
            let ist = self.umgebung.ist_aktiv(&id);

            match (soll, ist) {
                (true, false) => match self.umgebung.aktivieren(&id).await {
                    Ok(manifest) => {
                        aktiviert_melden(self.bus.as_ref(), &manifest);
                        bericht.aktiviert.push(id);
                    }
                    Err(e) => bericht.fehler.push((id, e)),
                },
                (false, true) => match self.umgebung.deaktivieren(&id).await {
                    Ok(manifest) => {
                        deaktiviert_melden(self.bus.as_ref(), &manifest);
                        bericht.deaktiviert.push(id);
                    }
                    Err(e) => bericht.fehler.push((id, e)),
                },
                _ => {}
            }
        }

        bericht.protokollieren();
        bericht
    }

    /// Schaltet ein Plugin in der Konfiguration ein
    ///
    /// Reine Konfigurationsaenderung; die Aktivierung folgt ueber die
    /// Aenderungsbenachrichtigung und den naechsten Abgleich.
    pub async fn plugin_einschalten(&self, id: &str) -> Result<()> {
        self.zustand_setzen(id, true).await
    }

    /// Schaltet ein Plugin in der Konfiguration aus
    pub async fn plugin_ausschalten(&self, id: &str) -> Result<()> {
        self.zustand_setzen(id, false).await
    }

    async fn zustand_setzen(&self, id: &str, aktiviert: bool) -> Result<()> {
        self.aktiviert_pruefen()?;
        if self.umgebung.plugin(id).await?.is_none() {
            return Err(PluginError::NichtInstalliert(id.to_string()));
        }
        self.konfig
            .aktualisieren(&mut |einstellungen: &mut PluginEinstellungen| {
                einstellungen
                    .zustaende
                    .entry(id.to_string())
                    .or_default()
                    .aktiviert = aktiviert;
            })
            .await?;
        info!(plugin_id = id, aktiviert, "Plugin-Zustand gespeichert");
        Ok(())
    }

    /// Manifeste aller bekannten Plugins, getrennt nach aktiv und inaktiv
    pub async fn plugin_manifeste(&self) -> Result<PluginsAntwort> {
        self.aktiviert_pruefen()?;
        let mut antwort = PluginsAntwort::default();
        for plugin in self.umgebung.plugins().await? {
            if self.umgebung.ist_aktiv(&plugin.manifest.id) {
                antwort.aktiv.push(plugin.manifest);
            } else {
                antwort.inaktiv.push(plugin.manifest);
            }
        }
        Ok(antwort)
    }

    /// Manifeste der aktiven Plugins (fuer den Web-Client)
    pub fn aktive_manifeste(&self) -> Result<Vec<PluginManifest>> {
        self.aktiviert_pruefen()?;
        Ok(self.umgebung.aktive_plugins())
    }

    /// Installiert ein Bundle aus einem tar.gz-Archiv
    pub async fn installieren(&self, archiv: Vec<u8>) -> Result<PluginManifest> {
        self.aktiviert_pruefen()?;
        let _guard = self.installations_sperre.lock().await;

        let umgebung = Arc::clone(&self.umgebung);
        let temp_basis = self.temp_basis.clone();
        tokio::task::spawn_blocking(move || {
            installer::installieren(&umgebung, std::io::Cursor::new(archiv), temp_basis.as_deref())
        })
        .await
        .map_err(|e| PluginError::Dateisystem(format!("Installations-Task abgebrochen: {e}")))?
    }

    /// Entfernt ein installiertes Bundle
    ///
    /// Ein aktives Plugin wird zuerst deaktiviert und die Deaktivierung
    /// gemeldet, bevor seine Dateien verschwinden.
    pub async fn entfernen(&self, id: &str) -> Result<()> {
        self.aktiviert_pruefen()?;
        let _installation = self.installations_sperre.lock().await;
        let _abgleich = self.abgleich_sperre.lock().await;

        let plugin = self
            .umgebung
            .plugin(id)
            .await?
            .ok_or_else(|| PluginError::NichtInstalliert(id.to_string()))?;
        let Some(verzeichnis) = plugin.verzeichnis else {
            return Err(PluginError::UngueltigesArgument(format!(
                "eingebautes Plugin '{id}' kann nicht entfernt werden"
            )));
        };

        if self.umgebung.ist_aktiv(id) {
            match self.umgebung.deaktivieren(id).await {
                Ok(manifest) => {
                    deaktiviert_melden(self.bus.as_ref(), &manifest);
                }
                Err(PluginError::NichtAktiv(_)) => {}
                Err(e) => return Err(e),
            }
        }

        tokio::task::spawn_blocking(move || installer::bundle_loeschen(&verzeichnis))
            .await
            .map_err(|e| PluginError::Dateisystem(format!("Entfernen-Task abgebrochen: {e}")))??;

        info!(plugin_id = id, "Plugin entfernt");
        Ok(())
    }

    /// Startet die Konfigurations-Beobachtung
    ///
    /// Bei jeder Aenderung: Abgleich, sofern das Plugin-System vorher und
    /// nachher eingeschaltet ist; danach erhalten alle aktiven Plugins den
    /// `konfiguration_geaendert`-Hook. Der Task endet mit `herunterfahren`
    /// oder wenn Manager oder Konfigurationsspeicher freigegeben werden.
    fn konfig_beobachten(self: &Arc<Self>) {
        let mut empfaenger = self.konfig.abonnieren();
        // Ausgangsstand vor dem Spawn: jede spaetere Aenderung wird gesehen
        let mut vorher = empfaenger.borrow_and_update().clone();
        let mut stopp = self.stopp.subscribe();
        let schwach = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stopp.changed() => break,
                    geaendert = empfaenger.changed() => {
                        if geaendert.is_err() {
                            break;
                        }
                    }
                }
                let aktuell = empfaenger.borrow_and_update().clone();
                let Some(manager) = schwach.upgrade() else {
                    break;
                };

                if vorher.aktiviert && aktuell.aktiviert {
                    manager.abgleichen().await;
                }
                for fehler in manager.umgebung.konfiguration_geaendert().await {
                    warn!(fehler = %fehler, "Konfigurations-Hook fehlgeschlagen");
                }
                vorher = aktuell;
            }
            debug!("Konfigurations-Beobachtung beendet");
        });
        *self.beobachter.lock() = Some(handle);
    }

    /// Beendet die Konfigurations-Beobachtung und deaktiviert alle Plugins
    ///
    /// Danach fuehrt auch ein expliziter [`Self::abgleichen`] nichts mehr
    /// aus. Jeder Fehler wird protokolliert und geliefert.
    pub async fn herunterfahren(&self) -> Vec<PluginError> {
        info!("Fahre Plugins herunter");
        self.heruntergefahren.store(true, Ordering::SeqCst);
        self.stopp.send_replace(true);

        let beobachter = self.beobachter.lock().take();
        if let Some(handle) = beobachter {
            if let Err(e) = handle.await {
                warn!(fehler = %e, "Konfigurations-Beobachtung nicht sauber beendet");
            }
        }

        let _guard = self.abgleich_sperre.lock().await;
        self.umgebung.herunterfahren().await
    }
}
