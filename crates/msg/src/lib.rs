//! kurier-msg – Identitaets-adressierter Nachrichtentransport
//!
//! Dieser Crate implementiert die Session-Abstraktion ueber dem opaken
//! Byte-Multiplexer: Identitaets-Handshake, Flusskontrolle mit Redline,
//! Heartbeats, Zustell-Reihenfolge pro Session und die beiden Engines.
//!
//! ## Architektur
//!
//! ```text
//! Laufzeit (Worker-Pool, 1-100 Threads)
//!     |
//!     +-- MsgClient ---- eine Session zum Server
//!     |       |  Zustaende: Verbindet -> Handshake -> Etabliert -> Geschlossen
//!     |       |  Wiederverbinder: neuer Versuch nach Intervall
//!     |       v
//!     |   SessionKern (FlussKontrolle, Schreiber-Task, Herzschlag-Task)
//!     |
//!     +-- MsgServer ---- Identitaet -> Session Tabelle (DashMap)
//!             |  Handshake: Klassen-Passwort, user_id-Zuteilung,
//!             |  Verdraengung alter Sessions derselben Identitaet
//!             v
//!         Versand (eine geordnete Ereignis-Queue pro Engine)
//! ```

pub mod fluss;
pub mod klient;
pub mod konfig;
pub mod laufzeit;
pub mod server;
pub mod session;
pub mod versand;
pub mod wiederverbinden;

// Bequeme Re-Exporte
pub use fluss::FlussKontrolle;
pub use klient::{KlientOptionen, MsgClient};
pub use konfig::{KlientKonfig, ServerKonfig};
pub use laufzeit::{version, Laufzeit};
pub use server::{MsgServer, SendeErgebnis};
