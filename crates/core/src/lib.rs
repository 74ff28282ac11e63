//! sprachrelais-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von Protokoll-, Voice- und
//! Server-Crate gemeinsam genutzt werden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{RelaisFehler, Result};
pub use types::{SatzId, SessionId};
