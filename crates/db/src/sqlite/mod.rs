//! SQLite-Backend-Implementierungen

pub mod plugin_kv;
pub mod pool;

pub use pool::SqliteDb;
