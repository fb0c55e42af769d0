//! REST-Handler fuer Plugin- und Session-Endpunkte

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use plugwerk_core::UserId;
use plugwerk_plugin::{ClientManifest, PluginManifest, PluginsAntwort};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::rest::{ApiFehler, ApiZustand};

/// Maximale Groesse eines hochgeladenen Bundles
pub const MAX_BUNDLE_BYTES: usize = 50 * 1024 * 1024;

/// `GET /api/v1/plugins`
pub async fn plugins_auflisten(
    State(zustand): State<ApiZustand>,
) -> Result<Json<PluginsAntwort>, ApiFehler> {
    Ok(Json(zustand.manager()?.plugin_manifeste().await?))
}

/// `POST /api/v1/plugins` mit dem tar.gz-Bundle als Body
pub async fn plugin_installieren(
    State(zustand): State<ApiZustand>,
    body: Bytes,
) -> Result<(StatusCode, Json<PluginManifest>), ApiFehler> {
    if body.is_empty() {
        return Err(ApiFehler::UngueltigeAnfrage("Bundle fehlt".into()));
    }
    let manifest = zustand.manager()?.installieren(body.to_vec()).await?;
    Ok((StatusCode::CREATED, Json(manifest)))
}

/// `DELETE /api/v1/plugins/:id`
pub async fn plugin_entfernen(
    State(zustand): State<ApiZustand>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiFehler> {
    zustand.manager()?.entfernen(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/plugins/:id/aktivieren`
pub async fn plugin_aktivieren(
    State(zustand): State<ApiZustand>,
    Path(id): Path<String>,
) -> Result<Response, ApiFehler> {
    zustand.manager()?.plugin_einschalten(&id).await?;
    Ok(status_ok())
}

/// `POST /api/v1/plugins/:id/deaktivieren`
pub async fn plugin_deaktivieren(
    State(zustand): State<ApiZustand>,
    Path(id): Path<String>,
) -> Result<Response, ApiFehler> {
    zustand.manager()?.plugin_ausschalten(&id).await?;
    Ok(status_ok())
}

/// `GET /api/v1/plugins/webapp` – Client-Manifeste der aktiven Plugins
pub async fn webapp_manifeste(
    State(zustand): State<ApiZustand>,
) -> Result<Json<Vec<ClientManifest>>, ApiFehler> {
    let manifeste = zustand
        .manager()?
        .aktive_manifeste()?
        .iter()
        .filter_map(PluginManifest::client_manifest)
        .collect();
    Ok(Json(manifeste))
}

#[derive(Debug, Deserialize)]
pub struct SessionAnfrage {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SessionAntwort {
    pub token: String,
    pub user_id: Uuid,
    pub laeuft_ab_am: String,
}

/// `POST /api/v1/sessions` – stellt eine Session fuer einen Benutzer aus
pub async fn session_erstellen(
    State(zustand): State<ApiZustand>,
    Json(anfrage): Json<SessionAnfrage>,
) -> (StatusCode, Json<SessionAntwort>) {
    let session = zustand.sessions.erstellen(UserId(anfrage.user_id)).await;
    (
        StatusCode::CREATED,
        Json(SessionAntwort {
            token: session.token,
            user_id: session.user_id.inner(),
            laeuft_ab_am: session.laeuft_ab_am.to_rfc3339(),
        }),
    )
}

/// `DELETE /api/v1/sessions/:token`
pub async fn session_beenden(
    State(zustand): State<ApiZustand>,
    Path(token): Path<String>,
) -> StatusCode {
    if zustand.sessions.invalidieren(&token).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

fn status_ok() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}
