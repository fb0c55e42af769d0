//! Aufloesung von Credentials zu Benutzer-Identitaeten
//!
//! Der Request-Router kennt nur diesen Trait; woher Sessions stammen
//! (In-Memory-Store, externe Datenbank, ...) bleibt verborgen.

use async_trait::async_trait;
use plugwerk_core::UserId;

use crate::error::AuthResult;

/// Loest ein Session-Credential zu einer Benutzer-ID auf
#[async_trait]
pub trait SessionAufloeser: Send + Sync {
    /// Gibt die Identitaet hinter `token` zurueck oder einen Fehler
    async fn aufloesen(&self, token: &str) -> AuthResult<UserId>;
}
