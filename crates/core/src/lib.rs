//! kurier-core – Gemeinsame Typen, Traits und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine des Kurier-Systems
//! bereit: das Identitaetsmodell (classId-userId-instId), die beiden
//! Beobachter-Traits fuer Client- und Server-Ereignisse sowie den
//! zentralen Fehler-Enum.

pub mod beobachter;
pub mod error;
pub mod identitaet;

// Re-Exporte fuer bequemen Zugriff
pub use beobachter::{ClientBeobachter, Nachricht, ServerBeobachter};
pub use error::{KurierError, Result};
pub use identitaet::{Identitaet, MmType};
