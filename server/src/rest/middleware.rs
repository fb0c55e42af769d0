//! Axum-Middleware fuer die Admin-Authentifizierung

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::rest::{ApiFehler, ApiZustand};

/// Extrahiert Bearer-Token aus dem Authorization-Header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Vergleich ohne frueh abzubrechen
fn gleich(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Laesst nur Anfragen mit dem konfigurierten Admin-Token durch
pub async fn admin_pruefen(
    State(zustand): State<ApiZustand>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let erlaubt = match (&zustand.admin_token, bearer_token(req.headers())) {
        (Some(erwartet), Some(token)) => gleich(erwartet.as_bytes(), token.as_bytes()),
        _ => false,
    };
    if !erlaubt {
        tracing::debug!(pfad = %req.uri().path(), "Admin-Anfrage abgewiesen");
        return ApiFehler::NichtAutorisiert.into_response();
    }
    next.run(req).await
}
