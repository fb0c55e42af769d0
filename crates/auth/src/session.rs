//! Session-Management fuer Plugwerk
//!
//! Sessions werden im Speicher gehalten (HashMap mit TTL) und sind der
//! Standard-[`SessionAufloeser`] fuer den Plugin-Router und die Admin-API.
//! Ein optionaler Hintergrund-Task bereinigt abgelaufene Sessions.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plugwerk_core::UserId;
use rand::RngCore;
use tokio::{sync::RwLock, task::JoinHandle};

use crate::aufloeser::SessionAufloeser;
use crate::error::{AuthError, AuthResult};

/// Standard-Session-Lebensdauer: 24 Stunden
pub const STANDARD_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Intervall fuer den automatischen Cleanup-Task: 15 Minuten
const CLEANUP_INTERVALL: Duration = Duration::from_secs(15 * 60);

/// Ein aktives Session-Token
#[derive(Debug, Clone)]
pub struct Session {
    /// Der Token-String (URL-sicheres Base64)
    pub token: String,
    /// Benutzer dem diese Session gehoert
    pub user_id: UserId,
    pub erstellt_am: DateTime<Utc>,
    pub laeuft_ab_am: DateTime<Utc>,
}

impl Session {
    /// Gibt `true` zurueck wenn die Session noch gueltig ist
    pub fn ist_gueltig(&self) -> bool {
        Utc::now() < self.laeuft_ab_am
    }
}

/// In-Memory Session-Store mit TTL-Unterstuetzung
#[derive(Debug)]
pub struct SessionStore {
    /// token -> Session
    sessions: RwLock<HashMap<String, Session>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    /// Erstellt einen neuen leeren Session-Store
    pub fn neu(ttl: Duration) -> Arc<Self> {
        let ttl = chrono::Duration::from_std(ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(STANDARD_TTL.as_secs() as i64));
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        })
    }

    /// Startet den periodischen Cleanup-Task
    ///
    /// Der Task haelt nur eine schwache Referenz und endet, sobald der
    /// Store freigegeben wurde.
    pub fn cleanup_starten(store: &Arc<Self>) -> JoinHandle<()> {
        let schwach = Arc::downgrade(store);
        tokio::spawn(async move {
            let mut intervall = tokio::time::interval(CLEANUP_INTERVALL);
            intervall.tick().await;
            loop {
                intervall.tick().await;
                let Some(store) = schwach.upgrade() else {
                    break;
                };
                let entfernt = store.cleanup_abgelaufene().await;
                if entfernt > 0 {
                    tracing::debug!(anzahl = entfernt, "Abgelaufene Sessions bereinigt");
                }
            }
        })
    }

    /// Erstellt eine neue Session fuer den angegebenen Benutzer
    pub async fn erstellen(&self, user_id: UserId) -> Session {
        let token = token_generieren();
        let jetzt = Utc::now();
        let session = Session {
            token: token.clone(),
            user_id,
            erstellt_am: jetzt,
            laeuft_ab_am: jetzt + self.ttl,
        };

        self.sessions.write().await.insert(token, session.clone());
        tracing::debug!(user_id = %user_id, "Neue Session erstellt");
        session
    }

    /// Validiert einen Session-Token und gibt die Session zurueck
    ///
    /// Gibt `AuthError::SessionUngueltig` zurueck wenn der Token nicht gefunden wurde.
    /// Gibt `AuthError::SessionAbgelaufen` zurueck wenn die Session abgelaufen ist.
    pub async fn validieren(&self, token: &str) -> AuthResult<Session> {
        let sessions = self.sessions.read().await;
        match sessions.get(token) {
            None => Err(AuthError::SessionUngueltig),
            Some(session) if !session.ist_gueltig() => Err(AuthError::SessionAbgelaufen),
            Some(session) => Ok(session.clone()),
        }
    }

    /// Invalidiert (loescht) eine Session anhand des Tokens
    pub async fn invalidieren(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Bereinigt abgelaufene Sessions und gibt die Anzahl der entfernten Sessions zurueck
    pub async fn cleanup_abgelaufene(&self) -> usize {
        let jetzt = Utc::now();
        let mut sessions = self.sessions.write().await;
        let vorher = sessions.len();
        sessions.retain(|_, s| s.laeuft_ab_am > jetzt);
        vorher - sessions.len()
    }

    /// Gibt die Anzahl der aktiven (nicht abgelaufenen) Sessions zurueck
    pub async fn anzahl_aktive(&self) -> usize {
        let jetzt = Utc::now();
        let sessions = self.sessions.read().await;
        sessions.values().filter(|s| s.laeuft_ab_am > jetzt).count()
    }
}

#[async_trait]
impl SessionAufloeser for SessionStore {
    async fn aufloesen(&self, token: &str) -> AuthResult<UserId> {
        if token.is_empty() {
            return Err(AuthError::CredentialFehlt);
        }
        self.validieren(token).await.map(|s| s.user_id)
    }
}

/// Generiert einen kryptografisch sicheren Session-Token (URL-sicheres Base64)
fn token_generieren() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}
