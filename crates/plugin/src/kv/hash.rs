//! Schluessel-Hashing fuer den Plugin-KV-Speicher
//!
//! FNV-1a (128 Bit) ueber `plugin_id ++ schluessel`, Base64-kodiert.
//! Die Ausgabe ist stabil ueber Neustarts und immer 24 Zeichen lang.

use base64::Engine;

use crate::error::{PluginError, Result};

const FNV128_OFFSET: u128 = 0x6c62272e07bb014262b821756295c58d;
const FNV128_PRIME: u128 = 0x0000000001000000000000000000013b;

/// Laenge eines gehashten Schluessels
pub const HASH_LAENGE: usize = 24;

/// Berechnet den Speicherschluessel fuer `(plugin_id, schluessel)`
pub fn schluessel_hash(plugin_id: &str, schluessel: &str) -> Result<String> {
    if plugin_id.is_empty() {
        return Err(PluginError::UngueltigesArgument("Plugin-ID ist leer".into()));
    }
    if schluessel.is_empty() {
        return Err(PluginError::UngueltigesArgument("Schluessel ist leer".into()));
    }

    let hash = fnv1a_128(plugin_id.bytes().chain(schluessel.bytes()));
    Ok(base64::engine::general_purpose::STANDARD.encode(hash.to_be_bytes()))
}

fn fnv1a_128(bytes: impl IntoIterator<Item = u8>) -> u128 {
    bytes.into_iter().fold(FNV128_OFFSET, |hash, byte| {
        (hash ^ u128::from(byte)).wrapping_mul(FNV128_PRIME)
    })
}
