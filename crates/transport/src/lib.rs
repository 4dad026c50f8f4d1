//! kurier-transport – Opake Kanal-Schnittstelle zum Byte-Multiplexer
//!
//! Der byte-orientierte Multiplexer (Sockets, TLS-Handshake, Framing,
//! Neuuebertragung) ist ein externer Kollaborateur. Dieses Crate
//! definiert genau die Schnittstelle die die Session-Schicht von ihm
//! konsumiert: ein Kanal der ausgehende `Rahmen` annimmt und eingehende
//! zustellt, plus Verbinder/Horcher fuer den Auf- und Abbau.
//!
//! `SpeicherNetz` ist die mitgelieferte In-Memory-Implementierung,
//! mit der das gesamte System ohne echten Draht getestet werden kann.

pub mod rahmen;
pub mod speicher;
pub mod verbindung;

// Bequeme Re-Exporte
pub use rahmen::Rahmen;
pub use speicher::{SpeicherHorcher, SpeicherNetz};
pub use verbindung::{Horcher, Netz, TransportVerbindung, Verbinder};
