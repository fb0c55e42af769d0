//! Request-Router – leitet `/plugins/<id>/...` an aktive Plugins weiter
//!
//! Vor der Weitergabe wird die Anfrage bereinigt: ein vom Client
//! gesendeter Benutzer-Header wird immer entfernt, Credentials (Session-
//! Cookie, `Authorization`, `Referer`, `access_token`) verlassen den Server
//! nie in Richtung Plugin. Der aufgeloeste Benutzer steht im
//! [`BENUTZER_HEADER`] und als [`AnfrageIdentitaet`]-Extension bereit.

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{
        header::{self, HeaderName, HeaderValue},
        request::Parts,
        uri::PathAndQuery,
        Method, Uri,
    },
    response::Response,
    routing::any,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use plugwerk_auth::SessionAufloeser;
use plugwerk_core::UserId;
use tracing::debug;

use crate::config::KonfigSpeicher;
use crate::error::{PluginError, Result};
use crate::manager::PluginManager;

/// Name des Session-Cookies
pub const SESSION_COOKIE: &str = "PWAUTHTOKEN";

/// Header mit der aufgeloesten Benutzer-ID
pub const BENUTZER_HEADER: HeaderName = HeaderName::from_static("plugwerk-user-id");

/// Query-Parameter fuer Tokens
pub const TOKEN_PARAMETER: &str = "access_token";

const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

/// Gemeinsamer Zustand der Plugin-Routen
#[derive(Clone)]
pub struct RouterZustand {
    /// `None` wenn das Plugin-System beim Start deaktiviert war
    pub manager: Option<Arc<PluginManager>>,
    pub konfig: Arc<dyn KonfigSpeicher>,
    pub aufloeser: Arc<dyn SessionAufloeser>,
}

/// Routing-Kontext, den das Plugin als Request-Extension erhaelt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginKontext {
    pub plugin_id: String,
    /// Pfad hinter `/plugins/<id>/`, ohne fuehrenden Slash
    pub unterpfad: String,
}

/// Authentifizierter Benutzer der Anfrage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnfrageIdentitaet(pub UserId);

/// Herkunft eines gefundenen Tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenQuelle {
    Header,
    Cookie,
    Query,
}

/// Baut die Plugin-Routen (`/plugins/:plugin_id` und alles darunter, jede Methode)
pub fn plugin_router(zustand: RouterZustand) -> Router {
    Router::new()
        .route("/plugins/:plugin_id", any(wurzel_weiterleiten))
        .route("/plugins/:plugin_id/*pfad", any(pfad_weiterleiten))
        .with_state(zustand)
}

async fn wurzel_weiterleiten(
    State(zustand): State<RouterZustand>,
    Path(plugin_id): Path<String>,
    anfrage: Request,
) -> Result<Response> {
    weiterleiten(zustand, plugin_id, String::new(), anfrage).await
}

async fn pfad_weiterleiten(
    State(zustand): State<RouterZustand>,
    Path((plugin_id, pfad)): Path<(String, String)>,
    anfrage: Request,
) -> Result<Response> {
    weiterleiten(zustand, plugin_id, pfad, anfrage).await
}

async fn weiterleiten(
    zustand: RouterZustand,
    plugin_id: String,
    unterpfad: String,
    anfrage: Request,
) -> Result<Response> {
    let einstellungen = zustand.konfig.einstellungen();
    let manager = match &zustand.manager {
        Some(manager) if einstellungen.aktiviert => manager,
        _ => return Err(PluginError::Deaktiviert),
    };
    let (manifest, instanz) = manager
        .umgebung()
        .aktiv(&plugin_id)
        .ok_or_else(|| PluginError::NichtAktiv(plugin_id.clone()))?;
    let unterpfad = manifest
        .unterpfad_aufloesen(&unterpfad)
        .map(str::to_string)
        .ok_or_else(|| PluginError::UnbekannteRoute(anfrage.uri().path().to_string()))?;

    let (mut teile, body) = anfrage.into_parts();

    // Nie dem Client glauben
    teile.headers.remove(&BENUTZER_HEADER);

    if let Some((token, quelle)) = token_ermitteln(&teile, einstellungen.token_in_query_erlauben) {
        match zustand.aufloeser.aufloesen(&token).await {
            Ok(benutzer) => {
                let wert = HeaderValue::from_str(&benutzer.inner().to_string())
                    .map_err(|e| PluginError::UngueltigesArgument(e.to_string()))?;
                teile.headers.insert(BENUTZER_HEADER, wert);
                teile.extensions.insert(AnfrageIdentitaet(benutzer));
            }
            Err(e) => {
                debug!(plugin_id = %plugin_id, ?quelle, fehler = %e, "Token nicht aufloesbar, anonyme Anfrage");
            }
        }
    }

    credentials_entfernen(&mut teile)?;
    teile.extensions.insert(PluginKontext {
        plugin_id: plugin_id.clone(),
        unterpfad,
    });

    debug!(plugin_id = %plugin_id, methode = %teile.method, "Anfrage an Plugin");
    Ok(instanz.anfrage_bearbeiten(Request::from_parts(teile, body)).await)
}

/// Sucht ein Token in fester Rangfolge: Header, Cookie, Query
///
/// Das Cookie zaehlt nur bei GET/HEAD oder mit
/// `X-Requested-With: XMLHttpRequest`.
pub fn token_ermitteln(teile: &Parts, query_erlauben: bool) -> Option<(String, TokenQuelle)> {
    if let Some(token) = header_token(teile) {
        return Some((token, TokenQuelle::Header));
    }

    let cookie_erlaubt = teile.method == Method::GET
        || teile.method == Method::HEAD
        || teile
            .headers
            .get(&X_REQUESTED_WITH)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    if cookie_erlaubt {
        let jar = CookieJar::from_headers(&teile.headers);
        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            if !cookie.value().is_empty() {
                return Some((cookie.value().to_string(), TokenQuelle::Cookie));
            }
        }
    }

    if query_erlauben {
        if let Some(token) = query_token(&teile.uri) {
            return Some((token, TokenQuelle::Query));
        }
    }
    None
}

/// `Authorization: Bearer <t>` oder `Authorization: Token <t>`, Schema ohne Gross-/Kleinschreibung
fn header_token(teile: &Parts) -> Option<String> {
    let wert = teile.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (schema, token) = wert.trim().split_once(' ')?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if schema.eq_ignore_ascii_case("bearer") || schema.eq_ignore_ascii_case("token") {
        Some(token.to_string())
    } else {
        None
    }
}

fn query_token(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, wert)| name == TOKEN_PARAMETER && !wert.is_empty())
        .map(|(_, wert)| wert.into_owned())
}

/// Entfernt Session-Cookie, `Authorization`, `Referer` und `access_token`
pub fn credentials_entfernen(teile: &mut Parts) -> Result<()> {
    teile.headers.remove(header::AUTHORIZATION);
    teile.headers.remove(header::REFERER);

    if teile.headers.contains_key(header::COOKIE) {
        // Reihenfolge der uebrigen Cookies bleibt erhalten
        let rest: Vec<String> = teile
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .map(str::trim)
            .filter(|paar| {
                !paar.is_empty()
                    && paar.split_once('=').map_or(*paar, |(name, _)| name.trim()) != SESSION_COOKIE
            })
            .map(str::to_string)
            .collect();
        teile.headers.remove(header::COOKIE);
        if !rest.is_empty() {
            let wert = HeaderValue::from_str(&rest.join("; "))
                .map_err(|e| PluginError::UngueltigesArgument(e.to_string()))?;
            teile.headers.insert(header::COOKIE, wert);
        }
    }

    if let Some(uri) = query_ohne_token(&teile.uri)? {
        teile.uri = uri;
    }
    Ok(())
}

/// Neue URI ohne `access_token`; `None` wenn nichts zu entfernen ist
fn query_ohne_token(uri: &Uri) -> Result<Option<Uri>> {
    let Some(query) = uri.query() else {
        return Ok(None);
    };
    let paare: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    if !paare.iter().any(|(name, _)| name == TOKEN_PARAMETER) {
        return Ok(None);
    }

    let rest = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(paare.iter().filter(|(name, _)| name != TOKEN_PARAMETER))
        .finish();
    let pfad_und_query = if rest.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), rest)
    };

    let mut teile = uri.clone().into_parts();
    teile.path_and_query = Some(
        PathAndQuery::try_from(pfad_und_query)
            .map_err(|e| PluginError::UngueltigesArgument(e.to_string()))?,
    );
    Uri::from_parts(teile)
        .map(Some)
        .map_err(|e| PluginError::UngueltigesArgument(e.to_string()))
}
