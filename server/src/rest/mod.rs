//! Admin-REST-API fuer die Plugin-Verwaltung

pub mod ereignisse;
pub mod handlers;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use plugwerk_auth::SessionStore;
use plugwerk_core::EventBus;
use plugwerk_plugin::{PluginError, PluginManager};
use serde_json::json;
use thiserror::Error;

pub use routes::api_router;

/// Axum-State der Admin-API
#[derive(Clone)]
pub struct ApiZustand {
    /// `None` wenn das Plugin-System beim Start deaktiviert war
    pub manager: Option<Arc<PluginManager>>,
    pub bus: Arc<dyn EventBus>,
    pub sessions: Arc<SessionStore>,
    /// Ohne Token ist die Admin-API gesperrt
    pub admin_token: Option<Arc<str>>,
}

impl ApiZustand {
    /// Manager oder [`PluginError::Deaktiviert`]
    pub fn manager(&self) -> Result<&Arc<PluginManager>, ApiFehler> {
        self.manager
            .as_ref()
            .ok_or(ApiFehler::Plugin(PluginError::Deaktiviert))
    }
}

/// Fehler der Admin-API
#[derive(Debug, Error)]
pub enum ApiFehler {
    #[error("Authorization-Header fehlt oder Token ungueltig")]
    NichtAutorisiert,

    #[error("Ungueltige Anfrage: {0}")]
    UngueltigeAnfrage(String),

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

impl IntoResponse for ApiFehler {
    fn into_response(self) -> Response {
        match self {
            Self::Plugin(e) => e.into_response(),
            Self::NichtAutorisiert => {
                fehler_antwort(StatusCode::UNAUTHORIZED, "api.nicht_autorisiert", &self.to_string())
            }
            Self::UngueltigeAnfrage(_) => {
                fehler_antwort(StatusCode::BAD_REQUEST, "api.ungueltige_anfrage", &self.to_string())
            }
        }
    }
}

/// Fehlerantwort im gleichen Format wie die Plugin-Fehler
pub fn fehler_antwort(status: StatusCode, code: &str, nachricht: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": code,
                "message": nachricht
            }
        })),
    )
        .into_response()
}
