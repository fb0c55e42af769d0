//! plugwerk-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod konfig_dienst;
pub mod logging;
pub mod rest;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    Router,
};
use config::ServerConfig;
use konfig_dienst::DateiKonfig;
use plugwerk_auth::{SessionAufloeser, SessionStore};
use plugwerk_core::{BroadcastBus, EventBus};
use plugwerk_plugin::{
    plugin_router, KonfigSpeicher, ManagerAbhaengigkeiten, PluginKvStore, PluginManager,
    RouterZustand, StatischerLader,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Alle laufenden Dienste, verdrahtet und bereit zum Ausliefern
pub struct Dienste {
    pub router: Router,
    pub manager: Option<Arc<PluginManager>>,
    pub sessions: Arc<SessionStore>,
    pub konfig: Arc<DateiKonfig>,
    pub bus: Arc<BroadcastBus>,
}

/// Haelt den Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    /// Datei in die Aenderungen der Plugin-Zustaende geschrieben werden
    pub config_pfad: Option<PathBuf>,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig, config_pfad: Option<PathBuf>) -> Self {
        Self {
            config,
            config_pfad,
        }
    }

    /// Baut alle Subsysteme auf
    ///
    /// Reihenfolge:
    /// 1. Datenbankverbindung herstellen (KV-Speicher der Plugins)
    /// 2. Session-Store mit Cleanup-Task
    /// 3. Event-Bus und Konfigurationsspeicher
    /// 4. Plugin-System starten (erster Abgleich)
    /// 5. HTTP-Router zusammensetzen
    pub async fn dienste_aufbauen(&self) -> Result<Dienste> {
        let db_config = self.config.datenbank.datenbank_config()?;
        tracing::info!(backend = %db_config.backend, url = %db_config.url, "Datenbankverbindung wird hergestellt");
        let repo = plugwerk_db::kv_repository_oeffnen(&db_config).await?;

        let sessions = SessionStore::neu(Duration::from_secs(self.config.sessions.ttl_sekunden));
        SessionStore::cleanup_starten(&sessions);

        let bus = Arc::new(BroadcastBus::default());
        let konfig = Arc::new(DateiKonfig::neu(
            self.config.clone(),
            self.config_pfad.clone(),
        ));

        let konfig_dyn: Arc<dyn KonfigSpeicher> = konfig.clone();
        let bus_dyn: Arc<dyn EventBus> = bus.clone();
        let manager = PluginManager::starten(ManagerAbhaengigkeiten {
            konfig: Arc::clone(&konfig_dyn),
            bus: Arc::clone(&bus_dyn),
            kv: PluginKvStore::neu(repo),
            lader: Arc::new(StatischerLader),
            eingebaute: Vec::new(),
        })
        .await?;

        let admin_token = self
            .config
            .sessions
            .admin_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(Arc::from);
        if admin_token.is_none() {
            tracing::warn!("Kein Admin-Token konfiguriert, Admin-API ist gesperrt");
        }

        let aufloeser: Arc<dyn SessionAufloeser> = sessions.clone();
        let plugins = plugin_router(RouterZustand {
            manager: manager.clone(),
            konfig: konfig_dyn,
            aufloeser,
        });
        let api = rest::api_router(rest::ApiZustand {
            manager: manager.clone(),
            bus: bus_dyn,
            sessions: Arc::clone(&sessions),
            admin_token,
        });

        let router = Router::new()
            .merge(plugins)
            .merge(api)
            .nest_service(
                "/static/plugins",
                ServeDir::new(&self.config.plugins.webapp_verzeichnis),
            )
            .layer(TraceLayer::new_for_http())
            .layer(self.cors());

        Ok(Dienste {
            router,
            manager,
            sessions,
            konfig,
            bus,
        })
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal (Ctrl-C)
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            http = %self.config.http_bind_adresse(),
            "Server startet"
        );

        let dienste = self.dienste_aufbauen().await?;
        let listener = tokio::net::TcpListener::bind(self.config.http_bind_adresse()).await?;
        tracing::info!(adresse = %self.config.http_bind_adresse(), "HTTP-Server bereit");

        let bus = Arc::clone(&dienste.bus);
        axum::serve(listener, dienste.router)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                // Offene SSE-Streams enden erst mit dem Bus
                bus.schliessen();
            })
            .await?;

        if let Some(manager) = &dienste.manager {
            let fehler = manager.herunterfahren().await;
            if !fehler.is_empty() {
                tracing::warn!(anzahl = fehler.len(), "Nicht alle Plugins konnten gestoppt werden");
            }
        }
        tracing::info!("Server beendet");
        Ok(())
    }

    /// CORS: entweder spezifische Origins oder alle
    fn cors(&self) -> CorsLayer {
        let origins = &self.config.netzwerk.cors_origins;
        if origins.is_empty() {
            return CorsLayer::permissive();
        }
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(tower_http::cors::Any)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(fehler = %e, "Shutdown-Signal konnte nicht abgewartet werden");
        return;
    }
    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
}
