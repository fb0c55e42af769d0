//! Lifecycle-Ereignisse fuer Plugins mit Client-Komponente
//!
//! Ereignisse werden nur gesendet, wenn das Manifest eine Web-Client-
//! Komponente deklariert; Server-only-Plugins sind fuer Clients unsichtbar.

use plugwerk_core::{EventBus, SystemEreignis};
use tracing::warn;

use crate::manifest::PluginManifest;

/// Meldet die Aktivierung; liefert ob ein Ereignis gesendet wurde
pub fn aktiviert_melden(bus: &dyn EventBus, manifest: &PluginManifest) -> bool {
    melden(bus, manifest, true)
}

/// Meldet die Deaktivierung; liefert ob ein Ereignis gesendet wurde
pub fn deaktiviert_melden(bus: &dyn EventBus, manifest: &PluginManifest) -> bool {
    melden(bus, manifest, false)
}

fn melden(bus: &dyn EventBus, manifest: &PluginManifest, aktiviert: bool) -> bool {
    let Some(client) = manifest.client_manifest() else {
        return false;
    };
    let client = match serde_json::to_value(&client) {
        Ok(wert) => wert,
        Err(e) => {
            warn!(plugin_id = %manifest.id, fehler = %e, "Client-Manifest nicht serialisierbar");
            return false;
        }
    };

    let plugin_id = manifest.id.clone();
    let ereignis = if aktiviert {
        SystemEreignis::PluginAktiviert {
            plugin_id,
            manifest: client,
        }
    } else {
        SystemEreignis::PluginDeaktiviert {
            plugin_id,
            manifest: client,
        }
    };

    match bus.senden(ereignis) {
        Ok(()) => true,
        Err(e) => {
            warn!(plugin_id = %manifest.id, fehler = %e, "Lifecycle-Ereignis konnte nicht gesendet werden");
            false
        }
    }
}
