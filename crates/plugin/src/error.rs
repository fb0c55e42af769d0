//! Fehlertypen fuer das Plugin-System
//!
//! Jede Variante hat eine stabile, maschinenlesbare Art ([`PluginError::art`])
//! und einen HTTP-Status; die lesbare Beschreibung kommt aus `Display`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Alle moeglichen Fehler im Plugin-System
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin-System ist deaktiviert")]
    Deaktiviert,

    #[error("Plugin nicht installiert: {0}")]
    NichtInstalliert(String),

    #[error("Plugin mit ID '{0}' ist bereits installiert")]
    DoppelteId(String),

    #[error("Manifest-Fehler: {0}")]
    Manifest(String),

    #[error("Archiv konnte nicht entpackt werden: {0}")]
    Archiv(String),

    #[error("Dateisystem-Fehler: {0}")]
    Dateisystem(String),

    #[error("Aktivierung von '{id}' fehlgeschlagen: {grund}")]
    Aktivierung { id: String, grund: String },

    #[error("Deaktivierung von '{id}' fehlgeschlagen: {grund}")]
    Deaktivierung { id: String, grund: String },

    #[error("Plugin ist bereits aktiv: {0}")]
    BereitsAktiv(String),

    #[error("Plugin ist nicht aktiv: {0}")]
    NichtAktiv(String),

    #[error("Keine Plugin-Route fuer Pfad: {0}")]
    UnbekannteRoute(String),

    #[error("Speicherfehler: {0}")]
    Speicher(String),

    #[error("Ungueltiges Argument: {0}")]
    UngueltigesArgument(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl PluginError {
    /// Stabile Fehlerart fuer API-Antworten und Logs
    pub fn art(&self) -> &'static str {
        match self {
            Self::Deaktiviert => "plugin.deaktiviert",
            Self::NichtInstalliert(_) => "plugin.nicht_installiert",
            Self::DoppelteId(_) => "plugin.doppelte_id",
            Self::Manifest(_) => "plugin.manifest",
            Self::Archiv(_) => "plugin.archiv",
            Self::Dateisystem(_) => "plugin.dateisystem",
            Self::Aktivierung { .. } => "plugin.aktivierung",
            Self::Deaktivierung { .. } => "plugin.deaktivierung",
            Self::BereitsAktiv(_) => "plugin.bereits_aktiv",
            Self::NichtAktiv(_) => "plugin.nicht_aktiv",
            Self::UnbekannteRoute(_) => "plugin.unbekannte_route",
            Self::Speicher(_) => "plugin.speicher",
            Self::UngueltigesArgument(_) => "plugin.ungueltiges_argument",
            Self::Konfiguration(_) => "plugin.konfiguration",
        }
    }

    /// HTTP-Statuscode fuer diesen Fehler
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Deaktiviert => StatusCode::NOT_IMPLEMENTED,
            Self::NichtInstalliert(_)
            | Self::DoppelteId(_)
            | Self::Manifest(_)
            | Self::Archiv(_)
            | Self::UngueltigesArgument(_) => StatusCode::BAD_REQUEST,
            Self::NichtAktiv(_) | Self::UnbekannteRoute(_) => StatusCode::NOT_FOUND,
            Self::BereitsAktiv(_) => StatusCode::CONFLICT,
            Self::Dateisystem(_)
            | Self::Aktivierung { .. }
            | Self::Deaktivierung { .. }
            | Self::Speicher(_)
            | Self::Konfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Fehlerkoerper im Format `{"error": {"code": .., "message": ..}}`
    pub fn als_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.art(),
                "message": self.to_string(),
            }
        })
    }

    pub(crate) fn dateisystem(kontext: &str, e: impl std::fmt::Display) -> Self {
        Self::Dateisystem(format!("{kontext}: {e}"))
    }
}

impl From<plugwerk_db::DbError> for PluginError {
    fn from(e: plugwerk_db::DbError) -> Self {
        Self::Speicher(e.to_string())
    }
}

impl IntoResponse for PluginError {
    fn into_response(self) -> Response {
        (self.http_status(), Json(self.als_json())).into_response()
    }
}

/// Result-Alias fuer das Plugin-System
pub type Result<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige_manifest() {
        let e = PluginError::Manifest("Pflichtfeld fehlt: id".into());
        assert_eq!(e.to_string(), "Manifest-Fehler: Pflichtfeld fehlt: id");
    }

    #[test]
    fn fehler_anzeige_aktivierung() {
        let e = PluginError::Aktivierung {
            id: "jira".into(),
            grund: "Port belegt".into(),
        };
        assert_eq!(
            e.to_string(),
            "Aktivierung von 'jira' fehlgeschlagen: Port belegt"
        );
    }

    #[test]
    fn deaktiviert_ist_501() {
        let e = PluginError::Deaktiviert;
        assert_eq!(e.http_status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(e.art(), "plugin.deaktiviert");
    }

    #[test]
    fn validierungsfehler_sind_400() {
        for e in [
            PluginError::NichtInstalliert("x".into()),
            PluginError::DoppelteId("x".into()),
            PluginError::UngueltigesArgument("x".into()),
        ] {
            assert_eq!(e.http_status(), StatusCode::BAD_REQUEST, "{e}");
        }
    }

    #[test]
    fn zustandsfehler() {
        assert_eq!(
            PluginError::NichtAktiv("x".into()).http_status(),
            StatusCode::NOT_FOUND
        );
        let e = PluginError::UnbekannteRoute("/plugins/x/y".into());
        assert_eq!(e.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(e.art(), "plugin.unbekannte_route");
        assert_eq!(
            PluginError::BereitsAktiv("x".into()).http_status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn json_koerper() {
        let json = PluginError::DoppelteId("jira".into()).als_json();
        assert_eq!(json["error"]["code"], "plugin.doppelte_id");
        assert!(json["error"]["message"].as_str().unwrap().contains("jira"));
    }

    #[test]
    fn db_fehler_wird_speicherfehler() {
        let e: PluginError = plugwerk_db::DbError::intern("Verbindung weg").into();
        assert!(matches!(e, PluginError::Speicher(_)));
    }
}
