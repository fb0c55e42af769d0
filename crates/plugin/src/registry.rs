//! Plugin-Umgebung – installierte Plugins finden und die aktive Menge fuehren
//!
//! Die Umgebung ist die einzige Stelle, die Plugins startet und stoppt.
//! Uebergaenge einer ID sind ueber eine eigene async-Sperre pro ID
//! serialisiert. Die Sperre der aktiven Menge wird nur fuer Pruefen und
//! Eintragen gehalten, nie waehrend ein Plugin startet oder stoppt.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::PluginApi;
use crate::error::{PluginError, Result};
use crate::hooks::{PluginHooks, PluginLader};
use crate::kv::PluginKvStore;
use crate::manifest::PluginManifest;
use crate::types::InstalliertesPlugin;

#[derive(Clone)]
struct PluginEintrag {
    manifest: PluginManifest,
    instanz: Arc<dyn PluginHooks>,
}

/// Registry der installierten und aktiven Plugins
pub struct PluginUmgebung {
    suchpfad: PathBuf,
    webapp_pfad: PathBuf,
    lader: Arc<dyn PluginLader>,
    kv: PluginKvStore,
    eingebaute: RwLock<BTreeMap<String, PluginEintrag>>,
    aktive: RwLock<HashMap<String, PluginEintrag>>,
    sperren: DashMap<String, Arc<Mutex<()>>>,
}

impl PluginUmgebung {
    /// Erstellt eine neue Umgebung ueber dem angegebenen Suchpfad
    pub fn neu(
        suchpfad: impl Into<PathBuf>,
        webapp_pfad: impl Into<PathBuf>,
        lader: Arc<dyn PluginLader>,
        kv: PluginKvStore,
    ) -> Self {
        Self {
            suchpfad: suchpfad.into(),
            webapp_pfad: webapp_pfad.into(),
            lader,
            kv,
            eingebaute: RwLock::new(BTreeMap::new()),
            aktive: RwLock::new(HashMap::new()),
            sperren: DashMap::new(),
        }
    }

    pub fn suchpfad(&self) -> &Path {
        &self.suchpfad
    }

    pub fn webapp_pfad(&self) -> &Path {
        &self.webapp_pfad
    }

    /// Registriert ein einkompiliertes Plugin und initialisiert es
    pub async fn eingebaut_registrieren(
        &self,
        manifest: PluginManifest,
        instanz: Arc<dyn PluginHooks>,
    ) -> Result<()> {
        manifest.validieren()?;
        if self.plugin(&manifest.id).await?.is_some() {
            return Err(PluginError::DoppelteId(manifest.id));
        }

        instanz
            .initialisieren(self.api_fuer(&manifest.id))
            .await
            .map_err(|e| PluginError::Aktivierung {
                id: manifest.id.clone(),
                grund: format!("Initialisierung: {e:#}"),
            })?;

        info!(plugin_id = %manifest.id, "Eingebautes Plugin registriert");
        self.eingebaute
            .write()
            .insert(manifest.id.clone(), PluginEintrag { manifest, instanz });
        Ok(())
    }

    /// Alle bekannten Plugins: eingebaute plus Bundles im Suchpfad
    ///
    /// Verzeichnisse ohne gueltiges Manifest werden protokolliert und
    /// uebersprungen. Ein fehlender Suchpfad ergibt nur die eingebauten.
    /// Der Suchpfad wird auf dem Blocking-Pool gelesen.
    pub async fn plugins(&self) -> Result<Vec<InstalliertesPlugin>> {
        let suchpfad = self.suchpfad.clone();
        let bundles = tokio::task::spawn_blocking(move || bundles_scannen(&suchpfad))
            .await
            .map_err(|e| PluginError::Dateisystem(format!("Suchpfad-Task abgebrochen: {e}")))??;
        Ok(self.zusammenfuehren(bundles))
    }

    /// Wie [`Self::plugins`], fuer Aufrufer die ohnehin blockieren duerfen
    pub fn plugins_blockierend(&self) -> Result<Vec<InstalliertesPlugin>> {
        Ok(self.zusammenfuehren(bundles_scannen(&self.suchpfad)?))
    }

    /// Sucht ein bekanntes Plugin per ID
    pub async fn plugin(&self, id: &str) -> Result<Option<InstalliertesPlugin>> {
        Ok(self.plugins().await?.into_iter().find(|p| p.manifest.id == id))
    }

    pub fn plugin_blockierend(&self, id: &str) -> Result<Option<InstalliertesPlugin>> {
        Ok(self
            .plugins_blockierend()?
            .into_iter()
            .find(|p| p.manifest.id == id))
    }

    /// Eingebaute zuerst; Bundles mit bereits vergebener ID werden ignoriert
    fn zusammenfuehren(&self, bundles: Vec<InstalliertesPlugin>) -> Vec<InstalliertesPlugin> {
        let mut gefunden: BTreeMap<String, InstalliertesPlugin> = self
            .eingebaute
            .read()
            .iter()
            .map(|(id, e)| {
                (
                    id.clone(),
                    InstalliertesPlugin {
                        manifest: e.manifest.clone(),
                        verzeichnis: None,
                    },
                )
            })
            .collect();

        for bundle in bundles {
            if gefunden.contains_key(&bundle.manifest.id) {
                warn!(
                    plugin_id = %bundle.manifest.id,
                    pfad = ?bundle.verzeichnis,
                    "Doppelte Plugin-ID im Suchpfad, Bundle ignoriert"
                );
                continue;
            }
            gefunden.insert(bundle.manifest.id.clone(), bundle);
        }
        gefunden.into_values().collect()
    }

    pub fn ist_aktiv(&self, id: &str) -> bool {
        self.aktive.read().contains_key(id)
    }

    /// Manifeste aller aktiven Plugins, nach ID sortiert
    pub fn aktive_plugins(&self) -> Vec<PluginManifest> {
        let mut manifeste: Vec<PluginManifest> = self
            .aktive
            .read()
            .values()
            .map(|e| e.manifest.clone())
            .collect();
        manifeste.sort_by(|a, b| a.id.cmp(&b.id));
        manifeste
    }

    /// Manifest und laufende Instanz eines aktiven Plugins
    pub fn aktiv(&self, id: &str) -> Option<(PluginManifest, Arc<dyn PluginHooks>)> {
        self.aktive
            .read()
            .get(id)
            .map(|e| (e.manifest.clone(), Arc::clone(&e.instanz)))
    }

    /// Aktiviert ein installiertes Plugin
    ///
    /// Schlaegt der Start fehl, bleibt das Plugin inaktiv.
    pub async fn aktivieren(&self, id: &str) -> Result<PluginManifest> {
        let sperre = self.sperre(id);
        let _guard = sperre.lock().await;

        if self.ist_aktiv(id) {
            return Err(PluginError::BereitsAktiv(id.to_string()));
        }
        let plugin = self
            .plugin(id)
            .await?
            .ok_or_else(|| PluginError::NichtInstalliert(id.to_string()))?;

        // Web-Bundle zuerst: scheitert es, existiert noch keine Instanz
        if let Some(verzeichnis) = &plugin.verzeichnis {
            if let Err(e) = self.webapp_bereitstellen(&plugin.manifest, verzeichnis).await {
                self.webapp_entfernen(id).await;
                return Err(e);
            }
        }

        let instanz = match self.instanz_erzeugen(&plugin).await {
            Ok(instanz) => instanz,
            Err(e) => {
                self.webapp_entfernen(id).await;
                return Err(e);
            }
        };

        if let Err(e) = instanz.aktivieren().await {
            self.webapp_entfernen(id).await;
            return Err(PluginError::Aktivierung {
                id: id.to_string(),
                grund: format!("{e:#}"),
            });
        }

        self.aktive.write().insert(
            id.to_string(),
            PluginEintrag {
                manifest: plugin.manifest.clone(),
                instanz,
            },
        );
        info!(plugin_id = id, version = %plugin.manifest.version, "Plugin aktiviert");
        Ok(plugin.manifest)
    }

    /// Deaktiviert ein aktives Plugin
    ///
    /// Schlaegt das Stoppen fehl, bleibt das Plugin aktiv.
    pub async fn deaktivieren(&self, id: &str) -> Result<PluginManifest> {
        let sperre = self.sperre(id);
        let _guard = sperre.lock().await;

        let Some(eintrag) = self.aktiver_eintrag(id) else {
            return Err(match self.plugin(id).await? {
                Some(_) => PluginError::NichtAktiv(id.to_string()),
                None => PluginError::NichtInstalliert(id.to_string()),
            });
        };

        eintrag
            .instanz
            .deaktivieren()
            .await
            .map_err(|e| PluginError::Deaktivierung {
                id: id.to_string(),
                grund: format!("{e:#}"),
            })?;

        self.aktive.write().remove(id);
        self.webapp_entfernen(id).await;
        info!(plugin_id = id, "Plugin deaktiviert");
        Ok(eintrag.manifest)
    }

    /// Deaktiviert alle aktiven Plugins und leert die aktive Menge
    ///
    /// Jedes Plugin wird versucht, auch wenn vorherige fehlschlagen.
    pub async fn herunterfahren(&self) -> Vec<PluginError> {
        let mut fehler = Vec::new();
        for id in self.aktive_ids() {
            if let Err(e) = self.deaktivieren(&id).await {
                error!(plugin_id = %id, fehler = %e, "Plugin konnte beim Herunterfahren nicht gestoppt werden");
                fehler.push(e);
            }
        }
        self.aktive.write().clear();
        fehler
    }

    /// Meldet eine Konfigurationsaenderung an alle aktiven Plugins
    pub async fn konfiguration_geaendert(&self) -> Vec<PluginError> {
        let eintraege: Vec<(String, Arc<dyn PluginHooks>)> = self
            .aktive
            .read()
            .iter()
            .map(|(id, e)| (id.clone(), Arc::clone(&e.instanz)))
            .collect();

        let mut fehler = Vec::new();
        for (id, instanz) in eintraege {
            if let Err(e) = instanz.konfiguration_geaendert().await {
                fehler.push(PluginError::Konfiguration(format!("{id}: {e:#}")));
            }
        }
        fehler
    }

    fn aktive_ids(&self) -> Vec<String> {
        self.aktive.read().keys().cloned().collect()
    }

    fn aktiver_eintrag(&self, id: &str) -> Option<PluginEintrag> {
        self.aktive.read().get(id).cloned()
    }

    fn eingebaute_instanz(&self, id: &str) -> Option<Arc<dyn PluginHooks>> {
        self.eingebaute.read().get(id).map(|e| Arc::clone(&e.instanz))
    }

    fn sperre(&self, id: &str) -> Arc<Mutex<()>> {
        Arc::clone(&self.sperren.entry(id.to_string()).or_default())
    }

    fn api_fuer(&self, id: &str) -> PluginApi {
        PluginApi::neu(id, self.kv.clone())
    }

    async fn instanz_erzeugen(&self, plugin: &InstalliertesPlugin) -> Result<Arc<dyn PluginHooks>> {
        let id = &plugin.manifest.id;
        let Some(verzeichnis) = &plugin.verzeichnis else {
            return self
                .eingebaute_instanz(id)
                .ok_or_else(|| PluginError::NichtInstalliert(id.clone()));
        };

        let instanz = self
            .lader
            .laden(&plugin.manifest, verzeichnis)
            .map_err(|e| PluginError::Aktivierung {
                id: id.clone(),
                grund: format!("Laden: {e:#}"),
            })?;
        instanz
            .initialisieren(self.api_fuer(id))
            .await
            .map_err(|e| PluginError::Aktivierung {
                id: id.clone(),
                grund: format!("Initialisierung: {e:#}"),
            })?;
        Ok(instanz)
    }

    /// Kopiert das Web-Client-Bundle nach `webapp_pfad/<id>/`
    async fn webapp_bereitstellen(&self, manifest: &PluginManifest, verzeichnis: &Path) -> Result<()> {
        let Some(client) = manifest.client_manifest() else {
            return Ok(());
        };
        let fehler = |grund: String| PluginError::Aktivierung {
            id: manifest.id.clone(),
            grund,
        };

        let quelle = verzeichnis.join(&client.bundle_path);
        let dateiname = quelle
            .file_name()
            .ok_or_else(|| fehler(format!("ungueltiger Bundle-Pfad: {}", client.bundle_path)))?;
        let ziel = self.webapp_pfad.join(&manifest.id);

        tokio::fs::create_dir_all(&ziel)
            .await
            .map_err(|e| fehler(format!("{}: {e}", ziel.display())))?;
        tokio::fs::copy(&quelle, ziel.join(dateiname))
            .await
            .map_err(|e| fehler(format!("Web-Bundle {}: {e}", quelle.display())))?;
        Ok(())
    }

    async fn webapp_entfernen(&self, id: &str) {
        let ziel = self.webapp_pfad.join(id);
        match tokio::fs::remove_dir_all(&ziel).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(plugin_id = id, fehler = %e, "Web-Bundle konnte nicht entfernt werden"),
        }
    }
}

/// Liest alle Bundles im Suchpfad (blockierend)
fn bundles_scannen(suchpfad: &Path) -> Result<Vec<InstalliertesPlugin>> {
    let eintraege = match std::fs::read_dir(suchpfad) {
        Ok(eintraege) => eintraege,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(suchpfad = %suchpfad.display(), "Suchpfad existiert nicht");
            return Ok(Vec::new());
        }
        Err(e) => return Err(PluginError::dateisystem("Suchpfad lesen", e)),
    };

    let mut pfade: Vec<PathBuf> = eintraege
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    pfade.sort();

    let mut bundles = Vec::with_capacity(pfade.len());
    for pfad in pfade {
        match PluginManifest::aus_verzeichnis(&pfad) {
            Ok(manifest) => bundles.push(InstalliertesPlugin {
                manifest,
                verzeichnis: Some(pfad),
            }),
            Err(e) => {
                warn!(pfad = %pfad.display(), fehler = %e, "Bundle ohne gueltiges Manifest uebersprungen");
            }
        }
    }
    Ok(bundles)
}

impl std::fmt::Debug for PluginUmgebung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginUmgebung")
            .field("suchpfad", &self.suchpfad)
            .field("webapp_pfad", &self.webapp_pfad)
            .field("aktive", &self.aktive_ids())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::StatischerLader;
    use plugwerk_db::SqliteDb;

    async fn umgebung(suchpfad: &Path, webapp: &Path) -> PluginUmgebung {
        let kv = PluginKvStore::neu(Arc::new(SqliteDb::in_memory().await.unwrap()));
        PluginUmgebung::neu(suchpfad, webapp, Arc::new(StatischerLader), kv)
    }

    fn bundle(suchpfad: &Path, verzeichnis: &str, manifest: &str) {
        let pfad = suchpfad.join(verzeichnis);
        std::fs::create_dir_all(&pfad).unwrap();
        std::fs::write(pfad.join("manifest.toml"), manifest).unwrap();
    }

    fn manifest(id: &str) -> String {
        format!("id = \"{id}\"\nname = \"{id}\"\nversion = \"1.0.0\"\n")
    }

    #[tokio::test]
    async fn fehlender_suchpfad_ist_leer() {
        let dir = tempfile::TempDir::new().unwrap();
        let u = umgebung(&dir.path().join("fehlt"), dir.path()).await;
        assert!(u.plugins().await.unwrap().is_empty());
        assert!(u.plugins_blockierend().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ungueltige_und_doppelte_bundles_werden_uebersprungen() {
        let dir = tempfile::TempDir::new().unwrap();
        bundle(dir.path(), "a", &manifest("a"));
        bundle(dir.path(), "a-kopie", &manifest("a"));
        bundle(dir.path(), "kaputt", "kein = [toml");
        std::fs::write(dir.path().join("lose-datei.txt"), "x").unwrap();

        let u = umgebung(dir.path(), &dir.path().join("webapp")).await;
        let plugins = u.plugins().await.unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].manifest.id, "a");
        assert!(!plugins[0].ist_eingebaut());
    }

    #[tokio::test]
    async fn uebergaenge() {
        let dir = tempfile::TempDir::new().unwrap();
        bundle(dir.path(), "a", &manifest("a"));
        let u = umgebung(dir.path(), &dir.path().join("webapp")).await;

        assert!(matches!(
            u.deaktivieren("a").await,
            Err(PluginError::NichtAktiv(_))
        ));
        assert!(matches!(
            u.aktivieren("fehlt").await,
            Err(PluginError::NichtInstalliert(_))
        ));

        u.aktivieren("a").await.unwrap();
        assert!(u.ist_aktiv("a"));
        assert!(u.aktiv("a").is_some());
        assert!(matches!(
            u.aktivieren("a").await,
            Err(PluginError::BereitsAktiv(_))
        ));

        u.deaktivieren("a").await.unwrap();
        assert!(!u.ist_aktiv("a"));
        assert!(u.aktiv("a").is_none());
    }

    #[tokio::test]
    async fn eingebaute_id_kollidiert_nicht_doppelt() {
        let dir = tempfile::TempDir::new().unwrap();
        bundle(dir.path(), "a", &manifest("a"));
        let u = umgebung(dir.path(), &dir.path().join("webapp")).await;

        let eingebaut = PluginManifest::parse(&manifest("a")).unwrap();
        let instanz: Arc<dyn PluginHooks> =
            Arc::new(crate::hooks::StatischesPlugin::neu(dir.path().join("public")));
        assert!(matches!(
            u.eingebaut_registrieren(eingebaut, instanz).await,
            Err(PluginError::DoppelteId(_))
        ));
    }

    #[tokio::test]
    async fn fehlendes_web_bundle_verhindert_aktivierung() {
        let dir = tempfile::TempDir::new().unwrap();
        let webapp = dir.path().join("webapp");
        bundle(
            dir.path(),
            "a",
            &format!("{}\n[webapp]\nbundle_path = \"webapp/fehlt.js\"\n", manifest("a")),
        );
        let u = umgebung(dir.path(), &webapp).await;

        assert!(matches!(
            u.aktivieren("a").await,
            Err(PluginError::Aktivierung { .. })
        ));
        assert!(!u.ist_aktiv("a"));
        assert!(!webapp.join("a").exists());

        // Mit vorhandenem Bundle klappt der naechste Versuch
        std::fs::create_dir_all(dir.path().join("a/webapp")).unwrap();
        std::fs::write(dir.path().join("a/webapp/fehlt.js"), "x").unwrap();
        u.aktivieren("a").await.unwrap();
        assert!(webapp.join("a/fehlt.js").is_file());
    }
}
