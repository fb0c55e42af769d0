//! plugwerk-auth – Sessions und Identitaetsaufloesung
//!
//! Dieses Crate implementiert:
//! - Session-Management (in-memory mit TTL und Cleanup-Task)
//! - [`SessionAufloeser`]: Aufloesung eines Credentials zu einer [`UserId`]
//!
//! [`UserId`]: plugwerk_core::UserId

pub mod aufloeser;
pub mod error;
pub mod session;

// Bequeme Re-Exporte
pub use aufloeser::SessionAufloeser;
pub use error::{AuthError, AuthResult};
pub use session::{Session, SessionStore};
