//! Bundle-Installation und -Entfernung
//!
//! Ein Bundle ist ein gzip-komprimiertes tar-Archiv. Es wird in ein
//! eigenes temporaeres Verzeichnis entpackt, das beim Verlassen der
//! Funktion auf jedem Weg (auch bei Panics) geloescht wird. Erst nach
//! erfolgreicher Validierung wird das Bundle nach `suchpfad/<id>` kopiert.
//!
//! Alle Funktionen sind blockierend und laufen im Manager ueber
//! `spawn_blocking`.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{PluginError, Result};
use crate::manifest::PluginManifest;
use crate::registry::PluginUmgebung;

/// Praefix der temporaeren Entpack-Verzeichnisse
pub const TEMP_PRAEFIX: &str = "plugwerk-bundle-";

/// Obergrenze fuer einen einzelnen entpackten Eintrag
pub const MAX_EINTRAG_BYTES: u64 = 100 * 1024 * 1024;

/// Obergrenze fuer die Summe aller entpackten Eintraege
pub const MAX_ENTPACKT_BYTES: u64 = 250 * 1024 * 1024;

/// Groessengrenzen beim Entpacken (Schutz vor Dekompressionsbomben)
#[derive(Debug, Clone, Copy)]
struct Grenzen {
    eintrag: u64,
    gesamt: u64,
}

const STANDARD_GRENZEN: Grenzen = Grenzen {
    eintrag: MAX_EINTRAG_BYTES,
    gesamt: MAX_ENTPACKT_BYTES,
};

/// Installiert ein Bundle in den Suchpfad der Umgebung
///
/// Aktiviert das Plugin nicht. `temp_basis` bestimmt wo entpackt wird;
/// ohne Angabe das System-Temp-Verzeichnis.
pub fn installieren<R: Read>(
    umgebung: &PluginUmgebung,
    archiv: R,
    temp_basis: Option<&Path>,
) -> Result<PluginManifest> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PRAEFIX);
    let temp = match temp_basis {
        Some(basis) => builder.tempdir_in(basis),
        None => builder.tempdir(),
    }
    .map_err(|e| PluginError::dateisystem("Temp-Verzeichnis anlegen", e))?;

    entpacken(archiv, temp.path(), STANDARD_GRENZEN)?;
    let wurzel = bundle_wurzel(temp.path())?;
    let manifest = PluginManifest::aus_verzeichnis(&wurzel)?;

    if umgebung.plugin_blockierend(&manifest.id)?.is_some() {
        return Err(PluginError::DoppelteId(manifest.id));
    }

    let ziel = umgebung.suchpfad().join(&manifest.id);
    if ziel.exists() {
        return Err(PluginError::Dateisystem(format!(
            "Zielverzeichnis existiert bereits: {}",
            ziel.display()
        )));
    }

    if let Err(e) = verzeichnis_kopieren(&wurzel, &ziel) {
        if let Err(aufraeumen) = fs::remove_dir_all(&ziel) {
            warn!(ziel = %ziel.display(), fehler = %aufraeumen, "Teilkopie konnte nicht entfernt werden");
        }
        return Err(e);
    }

    info!(plugin_id = %manifest.id, version = %manifest.version, "Plugin installiert");
    Ok(manifest)
}

/// Loescht ein Bundle-Verzeichnis rekursiv
pub fn bundle_loeschen(verzeichnis: &Path) -> Result<()> {
    fs::remove_dir_all(verzeichnis)
        .map_err(|e| PluginError::dateisystem(&format!("{} loeschen", verzeichnis.display()), e))?;
    debug!(verzeichnis = %verzeichnis.display(), "Bundle-Verzeichnis geloescht");
    Ok(())
}

fn entpacken<R: Read>(archiv: R, ziel: &Path, grenzen: Grenzen) -> Result<()> {
    let mut archiv = tar::Archive::new(GzDecoder::new(archiv));
    archiv.set_preserve_permissions(false);
    archiv.set_unpack_xattrs(false);

    let archiv_fehler = |e: std::io::Error| PluginError::Archiv(e.to_string());
    let mut gesamt: u64 = 0;
    for eintrag in archiv.entries().map_err(archiv_fehler)? {
        let mut eintrag = eintrag.map_err(archiv_fehler)?;

        // Die Header-Groesse begrenzt auch was tatsaechlich gelesen wird
        let groesse = eintrag.size();
        if groesse > grenzen.eintrag {
            return Err(PluginError::Archiv(format!(
                "Eintrag zu gross ({groesse} Bytes, maximal {})",
                grenzen.eintrag
            )));
        }
        gesamt = gesamt.saturating_add(groesse);
        if gesamt > grenzen.gesamt {
            return Err(PluginError::Archiv(format!(
                "Archiv zu gross (mehr als {} Bytes entpackt)",
                grenzen.gesamt
            )));
        }

        // unpack_in verwirft Eintraege die aus `ziel` ausbrechen
        if !eintrag.unpack_in(ziel).map_err(archiv_fehler)? {
            let pfad = eintrag
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            warn!(pfad = %pfad, "Archiv-Eintrag ausserhalb des Bundles uebersprungen");
        }
    }
    Ok(())
}

/// Genau ein Verzeichnis auf oberster Ebene ist die Bundle-Wurzel,
/// sonst das Entpack-Verzeichnis selbst
fn bundle_wurzel(entpackt: &Path) -> Result<PathBuf> {
    let eintraege: Vec<fs::DirEntry> = fs::read_dir(entpackt)
        .map_err(|e| PluginError::dateisystem("Entpacktes Archiv lesen", e))?
        .collect::<std::io::Result<_>>()
        .map_err(|e| PluginError::dateisystem("Entpacktes Archiv lesen", e))?;

    match eintraege.as_slice() {
        [einziger] if einziger.file_type().is_ok_and(|typ| typ.is_dir()) => Ok(einziger.path()),
        _ => Ok(entpackt.to_path_buf()),
    }
}

fn verzeichnis_kopieren(quelle: &Path, ziel: &Path) -> Result<()> {
    for eintrag in WalkDir::new(quelle) {
        let eintrag = eintrag.map_err(|e| PluginError::dateisystem("Bundle lesen", e))?;
        let relativ = eintrag
            .path()
            .strip_prefix(quelle)
            .map_err(|e| PluginError::dateisystem("Bundle lesen", e))?;
        let zielpfad = ziel.join(relativ);
        let typ = eintrag.file_type();

        if typ.is_dir() {
            fs::create_dir_all(&zielpfad)
                .map_err(|e| PluginError::dateisystem(&zielpfad.display().to_string(), e))?;
        } else if typ.is_file() {
            fs::copy(eintrag.path(), &zielpfad)
                .map_err(|e| PluginError::dateisystem(&zielpfad.display().to_string(), e))?;
        } else {
            debug!(pfad = %eintrag.path().display(), "Symlink im Bundle uebersprungen");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn einzelnes_verzeichnis_ist_wurzel() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir(dir.path().join("jira")).unwrap();
        assert_eq!(bundle_wurzel(dir.path()).unwrap(), dir.path().join("jira"));
    }

    #[test]
    fn mehrere_eintraege_ohne_huelle() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir(dir.path().join("public")).unwrap();
        fs::write(dir.path().join("manifest.toml"), "").unwrap();
        assert_eq!(bundle_wurzel(dir.path()).unwrap(), dir.path());
    }

    #[test]
    fn einzelne_datei_ist_keine_huelle() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("manifest.toml"), "").unwrap();
        assert_eq!(bundle_wurzel(dir.path()).unwrap(), dir.path());
    }

    #[test]
    fn rekursive_kopie() {
        let quelle = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(quelle.path().join("public/css")).unwrap();
        fs::write(quelle.path().join("manifest.toml"), "x").unwrap();
        fs::write(quelle.path().join("public/css/stil.css"), "body{}").unwrap();

        let ziel_basis = tempfile::TempDir::new().unwrap();
        let ziel = ziel_basis.path().join("kopie");
        verzeichnis_kopieren(quelle.path(), &ziel).unwrap();

        assert_eq!(fs::read_to_string(ziel.join("manifest.toml")).unwrap(), "x");
        assert_eq!(
            fs::read_to_string(ziel.join("public/css/stil.css")).unwrap(),
            "body{}"
        );
    }

    fn archiv(dateien: &[(&str, &[u8])]) -> Vec<u8> {
        use std::io::Write;

        let mut tar = tar::Builder::new(flate2::write::GzEncoder::new(
            Vec::new(),
            flate2::Compression::default(),
        ));
        for (pfad, inhalt) in dateien {
            let mut header = tar::Header::new_gnu();
            header.set_size(inhalt.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append_data(&mut header, pfad, *inhalt).unwrap();
        }
        let mut gz = tar.into_inner().unwrap();
        gz.flush().unwrap();
        gz.finish().unwrap()
    }

    #[test]
    fn kaputtes_archiv() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = entpacken(&b"kein gzip"[..], dir.path(), STANDARD_GRENZEN).unwrap_err();
        assert!(matches!(err, PluginError::Archiv(_)));
    }

    #[test]
    fn entpacken_innerhalb_der_grenzen() {
        let dir = tempfile::TempDir::new().unwrap();
        let daten = archiv(&[
            ("jira/manifest.toml", &b"x"[..]),
            ("jira/public/a.txt", &b"abc"[..]),
        ]);
        entpacken(&daten[..], dir.path(), STANDARD_GRENZEN).unwrap();
        assert_eq!(fs::read(dir.path().join("jira/public/a.txt")).unwrap(), b"abc");
    }

    #[test]
    fn zu_grosser_eintrag_abgelehnt() {
        let dir = tempfile::TempDir::new().unwrap();
        let gross = vec![0u8; 4096];
        let daten = archiv(&[("klein.txt", &b"x"[..]), ("gross.bin", &gross[..])]);
        let grenzen = Grenzen {
            eintrag: 1024,
            gesamt: u64::MAX,
        };

        let err = entpacken(&daten[..], dir.path(), grenzen).unwrap_err();
        assert!(matches!(err, PluginError::Archiv(ref m) if m.contains("Eintrag zu gross")));
        assert!(!dir.path().join("gross.bin").exists());
    }

    #[test]
    fn zu_grosses_archiv_abgelehnt() {
        let dir = tempfile::TempDir::new().unwrap();
        let block = vec![1u8; 600];
        let daten = archiv(&[("a.bin", &block[..]), ("b.bin", &block[..])]);
        let grenzen = Grenzen {
            eintrag: 1024,
            gesamt: 1000,
        };

        let err = entpacken(&daten[..], dir.path(), grenzen).unwrap_err();
        assert!(matches!(err, PluginError::Archiv(ref m) if m.contains("Archiv zu gross")));
        assert!(dir.path().join("a.bin").exists());
        assert!(!dir.path().join("b.bin").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_auf_verzeichnis_ist_keine_huelle() {
        let dir = tempfile::TempDir::new().unwrap();
        let extern_ = tempfile::TempDir::new().unwrap();
        std::os::unix::fs::symlink(extern_.path(), dir.path().join("link")).unwrap();
        assert_eq!(bundle_wurzel(dir.path()).unwrap(), dir.path());
    }
}
