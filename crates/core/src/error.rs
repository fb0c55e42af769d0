//! Fehlertypen fuer Plugwerk
//!
//! Zentraler Fehler-Enum fuer crate-uebergreifende Fehlerzustaende.
//! Untermodule definieren eigene Fehler und konvertieren bei Bedarf.

use thiserror::Error;

/// Globaler Result-Alias fuer Plugwerk
pub type Result<T> = std::result::Result<T, PlugwerkError>;

/// Crate-uebergreifende Fehler
#[derive(Debug, Error)]
pub enum PlugwerkError {
    #[error("Event-Bus geschlossen")]
    BusGeschlossen,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        assert_eq!(PlugwerkError::BusGeschlossen.to_string(), "Event-Bus geschlossen");
    }
}
