//! plugwerk-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! Plugwerk-Crates gemeinsam genutzt werden: Benutzer-IDs, der
//! systemweite Event-Bus und der zentrale Fehlertyp.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{PlugwerkError, Result};
pub use event::{BroadcastBus, EventBus, EventEmpfaenger, SystemEreignis};
pub use types::UserId;
