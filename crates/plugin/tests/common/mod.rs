//! Gemeinsame Test-Helfer: Test-Plugins, Bundle-Bau, Manager-Aufbau

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::Request,
    response::{IntoResponse, Response},
    Json,
};
use flate2::{write::GzEncoder, Compression};
use parking_lot::Mutex;
use plugwerk_core::{BroadcastBus, EventBus, EventEmpfaenger, SystemEreignis};
use plugwerk_db::SqliteDb;
use plugwerk_plugin::{
    AnfrageIdentitaet, KonfigSpeicher, ManagerAbhaengigkeiten, PluginEinstellungen, PluginHooks,
    PluginKontext, PluginKvStore, PluginLader, PluginManager, PluginManifest, PluginUmgebung,
    SpeicherKonfig,
};
use tempfile::TempDir;

/// Plugin das seine Lifecycle-Aufrufe zaehlt und Anfragen als JSON spiegelt
#[derive(Default)]
pub struct TestPlugin {
    pub aktivierungen: AtomicUsize,
    pub deaktivierungen: AtomicUsize,
    pub konfig_aenderungen: AtomicUsize,
    pub aktivieren_fehlschlagen: bool,
    pub deaktivieren_fehlschlagen: bool,
}

#[async_trait]
impl PluginHooks for TestPlugin {
    async fn aktivieren(&self) -> anyhow::Result<()> {
        if self.aktivieren_fehlschlagen {
            anyhow::bail!("Start verweigert");
        }
        self.aktivierungen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn deaktivieren(&self) -> anyhow::Result<()> {
        if self.deaktivieren_fehlschlagen {
            anyhow::bail!("Stopp verweigert");
        }
        self.deaktivierungen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn konfiguration_geaendert(&self) -> anyhow::Result<()> {
        self.konfig_aenderungen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn anfrage_bearbeiten(&self, anfrage: Request) -> Response {
        let header = |name: &str| {
            anfrage
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let kontext = anfrage.extensions().get::<PluginKontext>().cloned();
        let identitaet = anfrage
            .extensions()
            .get::<AnfrageIdentitaet>()
            .map(|i| i.0.inner().to_string());

        Json(serde_json::json!({
            "benutzer": header("plugwerk-user-id"),
            "authorization": header("authorization"),
            "referer": header("referer"),
            "cookie": header("cookie"),
            "uri": anfrage.uri().to_string(),
            "methode": anfrage.method().as_str(),
            "plugin_id": kontext.as_ref().map(|k| k.plugin_id.clone()),
            "unterpfad": kontext.map(|k| k.unterpfad),
            "identitaet": identitaet,
        }))
        .into_response()
    }
}

/// Lader der pro Plugin-ID ein [`TestPlugin`] erzeugt und festhaelt
#[derive(Default)]
pub struct TestLader {
    pub instanzen: Mutex<HashMap<String, Arc<TestPlugin>>>,
    pub start_fehler: Mutex<HashSet<String>>,
    pub stopp_fehler: Mutex<HashSet<String>>,
    pub lade_fehler: Mutex<HashSet<String>>,
}

impl TestLader {
    pub fn instanz(&self, id: &str) -> Option<Arc<TestPlugin>> {
        self.instanzen.lock().get(id).cloned()
    }
}

impl PluginLader for TestLader {
    fn laden(
        &self,
        manifest: &PluginManifest,
        _verzeichnis: &Path,
    ) -> anyhow::Result<Arc<dyn PluginHooks>> {
        if self.lade_fehler.lock().contains(&manifest.id) {
            anyhow::bail!("kein ladbares Plugin");
        }
        let plugin = Arc::new(TestPlugin {
            aktivieren_fehlschlagen: self.start_fehler.lock().contains(&manifest.id),
            deaktivieren_fehlschlagen: self.stopp_fehler.lock().contains(&manifest.id),
            ..Default::default()
        });
        self.instanzen
            .lock()
            .insert(manifest.id.clone(), Arc::clone(&plugin));
        Ok(plugin)
    }
}

/// Manifest im TOML-Format, optional mit Web-Client-Bundle
pub fn manifest_toml(id: &str, mit_webapp: bool) -> String {
    let mut toml = format!("id = \"{id}\"\nname = \"Plugin {id}\"\nversion = \"1.0.0\"\n");
    if mit_webapp {
        toml.push_str("\n[webapp]\nbundle_path = \"webapp/main.js\"\n");
    }
    toml
}

/// Baut ein tar.gz-Archiv aus `(pfad, inhalt)`-Paaren
pub fn bundle_bauen(dateien: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut tar = tar::Builder::new(encoder);
    for (pfad, inhalt) in dateien {
        let mut header = tar::Header::new_gnu();
        header.set_size(inhalt.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, pfad, *inhalt).unwrap();
    }
    let mut encoder = tar.into_inner().unwrap();
    encoder.flush().unwrap();
    encoder.finish().unwrap()
}

/// Ein vollstaendiges Bundle fuer `id` in einem Huellverzeichnis
pub fn plugin_bundle(id: &str, mit_webapp: bool) -> Vec<u8> {
    let manifest = manifest_toml(id, mit_webapp);
    let manifest_pfad = format!("{id}/manifest.toml");
    let webapp_pfad = format!("{id}/webapp/main.js");
    let public_pfad = format!("{id}/public/hallo.txt");
    let mut dateien: Vec<(&str, &[u8])> = vec![
        (manifest_pfad.as_str(), manifest.as_bytes()),
        (public_pfad.as_str(), b"hallo"),
    ];
    if mit_webapp {
        dateien.push((webapp_pfad.as_str(), b"console.log('plugin')"));
    }
    bundle_bauen(&dateien)
}

/// Testaufbau mit temporaeren Verzeichnissen und In-Memory-Datenbank
pub struct Aufbau {
    pub temp: TempDir,
    pub suchpfad: PathBuf,
    pub webapp: PathBuf,
    pub konfig: Arc<SpeicherKonfig>,
    pub bus: Arc<BroadcastBus>,
    pub lader: Arc<TestLader>,
    pub eingebaute: Vec<(PluginManifest, Arc<dyn PluginHooks>)>,
}

impl Aufbau {
    pub fn neu() -> Self {
        let temp = TempDir::new().unwrap();
        let suchpfad = temp.path().join("plugins");
        let webapp = temp.path().join("webapp");
        let einstellungen = PluginEinstellungen {
            verzeichnis: suchpfad.clone(),
            webapp_verzeichnis: webapp.clone(),
            temp_verzeichnis: Some(temp.path().join("tmp")),
            ..Default::default()
        };
        std::fs::create_dir_all(temp.path().join("tmp")).unwrap();

        Self {
            temp,
            suchpfad,
            webapp,
            konfig: Arc::new(SpeicherKonfig::neu(einstellungen)),
            bus: Arc::new(BroadcastBus::default()),
            lader: Arc::new(TestLader::default()),
            eingebaute: Vec::new(),
        }
    }

    /// Legt ein Bundle direkt im Suchpfad an
    pub fn bundle_anlegen(&self, id: &str, mit_webapp: bool) {
        let verzeichnis = self.suchpfad.join(id);
        std::fs::create_dir_all(verzeichnis.join("webapp")).unwrap();
        std::fs::write(verzeichnis.join("manifest.toml"), manifest_toml(id, mit_webapp)).unwrap();
        std::fs::write(verzeichnis.join("webapp/main.js"), "console.log('plugin')").unwrap();
    }

    /// Setzt den Soll-Zustand eines Plugins in der Konfiguration
    pub fn soll(&self, id: &str, aktiviert: bool) {
        self.konfig.aendern(|e| {
            e.zustaende.entry(id.to_string()).or_default().aktiviert = aktiviert;
        });
    }

    pub fn einstellungen_aendern(&self, aenderung: impl FnOnce(&mut PluginEinstellungen)) {
        self.konfig.aendern(aenderung);
    }

    pub async fn kv() -> PluginKvStore {
        PluginKvStore::neu(Arc::new(SqliteDb::in_memory().await.unwrap()))
    }

    pub async fn starten(&mut self) -> Option<Arc<PluginManager>> {
        let konfig: Arc<dyn KonfigSpeicher> = self.konfig.clone();
        let bus: Arc<dyn EventBus> = self.bus.clone();
        let lader: Arc<dyn PluginLader> = self.lader.clone();
        PluginManager::starten(ManagerAbhaengigkeiten {
            konfig,
            bus,
            kv: Self::kv().await,
            lader,
            eingebaute: std::mem::take(&mut self.eingebaute),
        })
        .await
        .unwrap()
    }

    /// Manager ohne Konfigurations-Beobachtung; Abgleiche nur von Hand
    pub async fn manager_ohne_beobachtung(&self) -> Arc<PluginManager> {
        std::fs::create_dir_all(&self.suchpfad).unwrap();
        std::fs::create_dir_all(&self.webapp).unwrap();
        let lader: Arc<dyn PluginLader> = self.lader.clone();
        let umgebung = Arc::new(PluginUmgebung::neu(
            self.suchpfad.clone(),
            self.webapp.clone(),
            lader,
            Self::kv().await,
        ));
        let konfig: Arc<dyn KonfigSpeicher> = self.konfig.clone();
        let bus: Arc<dyn EventBus> = self.bus.clone();
        PluginManager::neu(umgebung, konfig, bus)
    }

    pub fn abonnieren(&self) -> Box<dyn EventEmpfaenger> {
        self.bus.abonnieren()
    }
}

/// Wartet auf das naechste Ereignis (mit Zeitlimit)
pub async fn naechstes_ereignis(empfaenger: &mut Box<dyn EventEmpfaenger>) -> SystemEreignis {
    tokio::time::timeout(Duration::from_secs(5), empfaenger.empfangen())
        .await
        .expect("kein Ereignis innerhalb des Zeitlimits")
        .expect("Bus geschlossen")
}

/// Wartet bis `bedingung` erfuellt ist (mit Zeitlimit)
pub async fn warten_bis(mut bedingung: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !bedingung() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Bedingung innerhalb des Zeitlimits nicht erfuellt");
}
