//! Plugin-Manifest Parsing (manifest.toml / plugin.json)
//!
//! Jedes Bundle liefert an seiner Wurzel ein Manifest mit ID, Version,
//! optionalem Routen-Praefix und optionaler Web-Client-Komponente.
//! Ein deklarierter Praefix liegt immer unter `/plugins/<id>`.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::error::{PluginError, Result};

/// Dateinamen unter denen ein Manifest gesucht wird, in dieser Reihenfolge
pub const MANIFEST_DATEIEN: [&str; 2] = ["manifest.toml", "plugin.json"];

/// Maximale Laenge einer Plugin-ID (wird als Verzeichnisname verwendet)
pub const MAX_ID_LAENGE: usize = 190;

/// Vollstaendiges Plugin-Manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Deklarierter HTTP-Routen-Praefix (Standard: `/plugins/<id>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webapp: Option<WebappManifest>,
}

/// Web-Client-Komponente eines Plugins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebappManifest {
    /// Pfad zum Client-Bundle, relativ zur Bundle-Wurzel
    pub bundle_path: String,
}

/// Client-relevanter Ausschnitt eines Manifests (fuer Lifecycle-Ereignisse)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientManifest {
    pub id: String,
    pub version: String,
    pub bundle_path: String,
}

impl PluginManifest {
    /// Laedt ein Manifest aus einer Datei; `.json` wird als JSON gelesen, sonst TOML
    pub fn from_file(pfad: &Path) -> Result<Self> {
        let inhalt = std::fs::read_to_string(pfad)
            .map_err(|e| PluginError::Manifest(format!("{}: {}", pfad.display(), e)))?;
        if pfad.extension().is_some_and(|ext| ext == "json") {
            Self::parse_json(&inhalt)
        } else {
            Self::parse(&inhalt)
        }
    }

    /// Parst ein Manifest aus einem TOML-String
    pub fn parse(inhalt: &str) -> Result<Self> {
        toml::from_str(inhalt).map_err(|e| PluginError::Manifest(e.to_string()))
    }

    /// Parst ein Manifest aus einem JSON-String
    pub fn parse_json(inhalt: &str) -> Result<Self> {
        serde_json::from_str(inhalt).map_err(|e| PluginError::Manifest(e.to_string()))
    }

    /// Sucht, liest und validiert das Manifest an der Wurzel eines Bundles
    pub fn aus_verzeichnis(verzeichnis: &Path) -> Result<Self> {
        let pfad = manifest_pfad(verzeichnis).ok_or_else(|| {
            PluginError::Manifest(format!(
                "kein Manifest in {} gefunden",
                verzeichnis.display()
            ))
        })?;
        let manifest = Self::from_file(&pfad)?;
        manifest.validieren()?;
        Ok(manifest)
    }

    /// Validiert das Manifest auf Pflichtfelder und Konsistenz
    pub fn validieren(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(PluginError::Manifest("Pflichtfeld fehlt: id".into()));
        }
        if !ist_gueltige_id(&self.id) {
            return Err(PluginError::Manifest(format!("ungueltige Plugin-ID: '{}'", self.id)));
        }
        if self.name.is_empty() {
            return Err(PluginError::Manifest("Pflichtfeld fehlt: name".into()));
        }
        // Version muss semver-kompatibel sein (x.y.z)
        if !ist_semver(&self.version) {
            return Err(PluginError::Manifest(format!(
                "ungueltige Version: '{}'",
                self.version
            )));
        }
        if let Some(route) = &self.route {
            if self.routen_zusatz().is_none() {
                return Err(PluginError::Manifest(format!(
                    "Route muss unter '/plugins/{}' liegen: '{route}'",
                    self.id
                )));
            }
        }
        if let Some(webapp) = &self.webapp {
            if !webapp.bundle_path.is_empty() && !ist_relativer_pfad(&webapp.bundle_path) {
                return Err(PluginError::Manifest(format!(
                    "webapp.bundle_path muss relativ zum Bundle sein: '{}'",
                    webapp.bundle_path
                )));
            }
        }
        Ok(())
    }

    /// Ob das Plugin eine Web-Client-Komponente mitbringt
    pub fn hat_client(&self) -> bool {
        self.webapp
            .as_ref()
            .is_some_and(|w| !w.bundle_path.is_empty())
    }

    /// Client-Ausschnitt, nur fuer Plugins mit Client-Komponente
    pub fn client_manifest(&self) -> Option<ClientManifest> {
        if !self.hat_client() {
            return None;
        }
        let webapp = self.webapp.as_ref()?;
        Some(ClientManifest {
            id: self.id.clone(),
            version: self.version.clone(),
            bundle_path: webapp.bundle_path.clone(),
        })
    }

    /// Effektiver Routen-Praefix ohne abschliessenden Schraegstrich
    pub fn route_praefix(&self) -> String {
        match &self.route {
            Some(route) => route.trim_end_matches('/').to_string(),
            None => format!("/plugins/{}", self.id),
        }
    }

    /// Loest einen Pfad unterhalb von `/plugins/<id>/` gegen den Praefix auf
    ///
    /// Liefert den Rest unterhalb des deklarierten Praefixes (ohne fuehrenden
    /// Schraegstrich) oder `None` wenn der Pfad nicht darunter liegt.
    pub fn unterpfad_aufloesen<'a>(&self, pfad: &'a str) -> Option<&'a str> {
        let zusatz = self.routen_zusatz()?;
        if zusatz.is_empty() {
            return Some(pfad);
        }
        let rest = pfad.strip_prefix(zusatz.as_str())?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }

    /// Teil des Praefixes unterhalb von `/plugins/<id>`; `None` wenn ausserhalb
    fn routen_zusatz(&self) -> Option<String> {
        let basis = format!("/plugins/{}", self.id);
        let praefix = self.route_praefix();
        let zusatz = praefix.strip_prefix(basis.as_str())?;
        if zusatz.is_empty() {
            return Some(String::new());
        }
        let zusatz = zusatz.strip_prefix('/')?;
        let gueltig = zusatz
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
        gueltig.then(|| zusatz.to_string())
    }
}

/// Erste vorhandene Manifest-Datei im Verzeichnis
pub fn manifest_pfad(verzeichnis: &Path) -> Option<PathBuf> {
    MANIFEST_DATEIEN
        .iter()
        .map(|name| verzeichnis.join(name))
        .find(|pfad| pfad.is_file())
}

/// Einfache Pruefung ob ein String semver-Format hat (x.y.z)
fn ist_semver(v: &str) -> bool {
    let teile: Vec<&str> = v.split('.').collect();
    if teile.len() != 3 {
        return false;
    }
    teile.iter().all(|t| t.parse::<u32>().is_ok())
}

/// Plugin-IDs werden Verzeichnisnamen: nur `[A-Za-z0-9._-]`, kein fuehrender Punkt
fn ist_gueltige_id(id: &str) -> bool {
    id.len() <= MAX_ID_LAENGE
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

pub(crate) fn ist_relativer_pfad(pfad: &str) -> bool {
    Path::new(pfad)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
