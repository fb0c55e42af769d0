//! Route-Definitionen fuer die Admin-API (/api/v1/...)

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::rest::{ereignisse, handlers, middleware::admin_pruefen, ApiZustand};

/// Erstellt den vollstaendigen API-Router inkl. `/health`
pub fn api_router(zustand: ApiZustand) -> Router {
    let admin = Router::new()
        // Plugins
        .route(
            "/api/v1/plugins",
            get(handlers::plugins_auflisten).post(handlers::plugin_installieren),
        )
        .route("/api/v1/plugins/webapp", get(handlers::webapp_manifeste))
        .route("/api/v1/plugins/ereignisse", get(ereignisse::ereignisse))
        .route("/api/v1/plugins/:id", delete(handlers::plugin_entfernen))
        .route(
            "/api/v1/plugins/:id/aktivieren",
            post(handlers::plugin_aktivieren),
        )
        .route(
            "/api/v1/plugins/:id/deaktivieren",
            post(handlers::plugin_deaktivieren),
        )
        // Sessions
        .route("/api/v1/sessions", post(handlers::session_erstellen))
        .route("/api/v1/sessions/:token", delete(handlers::session_beenden))
        .layer(DefaultBodyLimit::max(handlers::MAX_BUNDLE_BYTES))
        .layer(middleware::from_fn_with_state(zustand.clone(), admin_pruefen));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(admin)
        .with_state(zustand)
}
