//! plugwerk-plugin – Plugin-Verwaltung
//!
//! Dieses Crate implementiert das Plugin-System des Plugwerk-Servers:
//! Bundles installieren und entfernen, die aktive Menge mit der
//! Konfiguration abgleichen, HTTP-Anfragen an Plugins weiterleiten und
//! jedem Plugin einen eigenen Schluessel-Wert-Namensraum geben.
//!
//! # Architektur
//! - [`manager::PluginManager`] – Abgleich, Installieren, Entfernen, Herunterfahren
//! - [`registry::PluginUmgebung`] – installierte und aktive Plugins
//! - [`manifest::PluginManifest`] – Plugin-Metadaten
//! - [`installer`] – tar.gz-Bundles entpacken, pruefen, kopieren
//! - [`kv::PluginKvStore`] – KV-Speicher mit gehashten Schluesseln
//! - [`router`] – `/plugins/<id>/...` mit Credential-Bereinigung
//! - [`hooks::PluginHooks`] – Schnittstelle die jedes Plugin implementiert

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod hooks;
pub mod installer;
pub mod kv;
pub mod manager;
pub mod manifest;
pub mod registry;
pub mod router;
pub mod types;

// Bequeme Re-Exporte
pub use api::PluginApi;
pub use config::{Aenderung, KonfigSpeicher, PluginEinstellungen, PluginZustand, SpeicherKonfig};
pub use error::{PluginError, Result};
pub use hooks::{PluginHooks, PluginLader, StatischerLader, StatischesPlugin};
pub use kv::{schluessel_hash, PluginKvStore};
pub use manager::{AbgleichBericht, ManagerAbhaengigkeiten, PluginManager};
pub use manifest::{ClientManifest, PluginManifest, WebappManifest};
pub use registry::PluginUmgebung;
pub use router::{plugin_router, AnfrageIdentitaet, PluginKontext, RouterZustand};
pub use types::{InstalliertesPlugin, PluginsAntwort};
