//! Plugwerk Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use std::path::PathBuf;

use anyhow::Result;
use plugwerk_server::{config::ServerConfig, logging, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad =
        PathBuf::from(std::env::var("PLUGWERK_CONFIG").unwrap_or_else(|_| "config.toml".into()));

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = ServerConfig::laden(&config_pfad)?;

    logging::logging_initialisieren(&config.logging.level, &config.logging.format);
    if !logging::log_format_gueltig(&config.logging.format) {
        tracing::warn!(format = %config.logging.format, "Unbekanntes Log-Format, verwende text");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad.display(),
        "Plugwerk Server wird initialisiert"
    );

    let server = Server::neu(config, Some(config_pfad));
    server.starten().await?;

    Ok(())
}
