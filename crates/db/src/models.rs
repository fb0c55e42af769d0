//! Datenbankmodelle fuer den Plugin-KV-Speicher

use crate::error::DbError;

/// Maximale Laenge des gehashten Schluessels (in Zeichen)
pub const KV_SCHLUESSEL_MAX_ZEICHEN: usize = 128;

/// Maximale Groesse eines gespeicherten Werts
pub const KV_WERT_MAX_BYTES: usize = 8192;

/// Ein Datensatz im Plugin-KV-Speicher
///
/// `schluessel` ist immer der gehashte Schluessel, nie der Rohschluessel
/// eines Plugins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginKvRecord {
    pub schluessel: String,
    pub wert: Vec<u8>,
}

impl PluginKvRecord {
    pub fn neu(schluessel: impl Into<String>, wert: impl Into<Vec<u8>>) -> Self {
        Self {
            schluessel: schluessel.into(),
            wert: wert.into(),
        }
    }

    /// Prueft Schluessel- und Wertgrenzen vor dem Schreiben
    pub fn validieren(&self) -> Result<(), DbError> {
        if self.schluessel.is_empty() {
            return Err(DbError::UngueltigeDaten("Schluessel ist leer".into()));
        }
        let zeichen = self.schluessel.chars().count();
        if zeichen > KV_SCHLUESSEL_MAX_ZEICHEN {
            return Err(DbError::UngueltigeDaten(format!(
                "Schluessel zu lang: {zeichen} > {KV_SCHLUESSEL_MAX_ZEICHEN} Zeichen"
            )));
        }
        if self.wert.len() > KV_WERT_MAX_BYTES {
            return Err(DbError::UngueltigeDaten(format!(
                "Wert zu gross: {} > {KV_WERT_MAX_BYTES} Bytes",
                self.wert.len()
            )));
        }
        Ok(())
    }
}
